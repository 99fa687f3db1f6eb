use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use log::info;

use syllable_core::benchmark::{BenchmarkReport, TimingSummary};
use syllable_core::config::Settings;
use syllable_core::model::counter::{Counted, WordOutcome, WordResult};
use syllable_core::model::dictionary::PronunciationDictionary;
use syllable_core::service::SyllableService;

#[derive(Parser, Debug)]
#[command(name = "syllable-cli")]
#[command(about = "Count syllables in English words and text")]
struct Args {
    /// Text to count; starts an interactive session when empty
    text: Vec<String>,

    /// JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pronunciation dictionary (CMUdict format)
    #[arg(short, long)]
    dictionary: Option<PathBuf>,

    /// Model weights file (JSON)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Run without a fallback model
    #[arg(long)]
    no_model: bool,

    /// Do not read or write the binary dictionary cache
    #[arg(long)]
    no_cache: bool,

    /// Show the method used for every word
    #[arg(long)]
    detailed: bool,

    /// Only print the total number of syllables
    #[arg(long)]
    total: bool,

    /// Read text from stdin line by line
    #[arg(short, long)]
    interactive: bool,

    /// Run the built-in benchmark
    #[arg(short, long)]
    bench: bool,

    /// Print running statistics before exiting
    #[arg(short, long)]
    stats: bool,
}

fn print_outcome(outcome: &WordOutcome) {
    match outcome.result {
        WordResult::Hit { count, source } => println!("   {:16} → {} ({:?})", outcome.word, count, source),
        WordResult::Miss(reason) => println!("   {:16} → ? ({})", outcome.word, reason),
    }
}

fn print_counted(service: &SyllableService, text: &str, args: &Args) -> Result<(), Box<dyn Error>> {
    if args.total {
        println!("{}", service.total_syllables(text)?);
    } else if args.detailed {
        match service.count_detailed(text)? {
            Counted::Single(outcome) => print_outcome(&outcome),
            Counted::Multiple(outcomes) => outcomes.iter().for_each(print_outcome),
        }
    } else {
        match service.count(text)? {
            Counted::Single(count) => println!("{count}"),
            Counted::Multiple(counts) => println!("{counts:?} (total: {})", counts.iter().sum::<u32>()),
        }
    }
    Ok(())
}

fn print_timings(summary: Option<TimingSummary>) {
    let Some(summary) = summary else {
        println!("   No data yet");
        return;
    };
    println!("   Inferences: {}", summary.samples);
    println!("   Average: {:.2}ms", summary.mean_ms);
    println!("   Median: {:.2}ms", summary.median_ms);
    println!("   Fastest: {:.2}ms", summary.min_ms);
    println!("   Slowest: {:.2}ms", summary.max_ms);
    if let Some(std_dev) = summary.std_dev_ms {
        println!("   Std dev: {std_dev:.2}ms");
    }
}

fn print_benchmark(report: &BenchmarkReport) {
    println!("Benchmark with common words:");
    for entry in &report.entries {
        let method = entry.method.map(|m| format!("{m:?}")).unwrap_or_else(|| "miss".to_owned());
        println!("   {:12} → {} [{}] ({:.2}ms)", entry.word, entry.syllables, method, entry.elapsed_ms);
    }
    println!("   Dictionary hit rate: {:.1}%", report.dictionary_hit_rate * 100.0);
    println!("   Total syllables: {}", report.total_syllables);
    print_timings(report.timing.clone());
}

fn print_stats(service: &SyllableService) -> Result<(), Box<dyn Error>> {
    let stats = service.stats()?;
    println!("Statistics:");
    println!("   Requests: {}", stats.counters.total_requests);
    println!("   Dictionary hits: {}", stats.counters.dictionary_hits);
    println!("   Model predictions: {}", stats.counters.model_predictions);
    println!("   Errors: {}", stats.counters.errors);
    println!("   Average response: {:.3}ms", stats.counters.average_response_time_ms);
    println!("   Model: {:?}", stats.model_status);
    Ok(())
}

/// Reads lines from stdin until EOF or `quit`.
///
/// Commands: `quit`/`exit`/`q`, `bench`, `stats`. Anything else is counted
/// and timed.
fn interactive(service: &SyllableService, args: &Args) -> Result<(), Box<dyn Error>> {
    println!("Type words or sentences. Commands: 'quit' to exit, 'bench' for benchmark, 'stats' for timings");
    let mut times = Vec::new();
    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let text = line.trim();

        match text.to_lowercase().as_str() {
            "" => continue,
            "quit" | "exit" | "q" => break,
            "bench" => print_benchmark(&service.benchmark()?),
            "stats" => {
                print_timings(TimingSummary::from_samples(&times));
                print_stats(service)?;
            }
            _ => {
                let start = Instant::now();
                print_counted(service, text, args)?;
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                times.push(elapsed_ms);
                println!("   Speed: {elapsed_ms:.2}ms");
            }
        }
    }

    println!("Session summary:");
    print_timings(TimingSummary::from_samples(&times));
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(path) = &args.dictionary {
        settings.dictionary.path = path.clone();
    }
    if let Some(path) = &args.model {
        settings.model.path = path.clone();
    }
    if args.no_model {
        settings.model.enabled = false;
    }
    if args.no_cache {
        settings.dictionary.cache = false;
    }

    // Loading the dictionary is the slow part
    let start = Instant::now();
    let dictionary = if settings.dictionary.cache {
        PronunciationDictionary::load_cached(&settings.dictionary.path)?
    } else {
        PronunciationDictionary::load(&settings.dictionary.path)?
    };
    let service = SyllableService::start(Arc::new(dictionary), settings.model_source(), settings.request_timeout())?;
    // Every mode counts right away, so the model has to be in place first
    let status = service.wait_for_model(settings.request_timeout());
    info!("loaded in {:.2}s (model {status:?})", start.elapsed().as_secs_f64());

    let text = args.text.join(" ");

    if !text.trim().is_empty() {
        print_counted(&service, &text, &args)?;
    }

    if args.bench {
        print_benchmark(&service.benchmark()?);
    }

    if args.interactive || (text.trim().is_empty() && !args.bench && !args.stats) {
        interactive(&service, &args)?;
    }

    if args.stats {
        print_stats(&service)?;
    }

    Ok(())
}
