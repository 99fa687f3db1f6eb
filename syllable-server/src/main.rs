use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use clap::Parser;
use log::{info, warn};

use syllable_core::config::Settings;
use syllable_core::model::dictionary::PronunciationDictionary;
use syllable_core::service::SyllableService;

mod routes;

use routes::AppState;

/// Command-line flags, applied over the settings file and environment.
#[derive(Parser, Debug)]
#[command(name = "syllable-server")]
#[command(about = "HTTP service counting syllables with a dictionary and a fallback model")]
struct Args {
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

	/// Address to bind
	#[arg(long)]
	host: Option<String>,

	/// Port to bind
	#[arg(short, long)]
	port: Option<u16>,

	/// Load everything, run the benchmark once and exit instead of serving
	#[arg(long)]
	no_web: bool,
}

impl Args {
	fn apply(self, mut settings: Settings) -> Settings {
		if let Some(path) = self.dictionary {
			settings.dictionary.path = path;
		}
		if let Some(path) = self.model {
			settings.model.path = path;
		}
		if self.no_model {
			settings.model.enabled = false;
		}
		if self.no_cache {
			settings.dictionary.cache = false;
		}
		if let Some(host) = self.host {
			settings.web.host = host;
		}
		if let Some(port) = self.port {
			settings.web.port = port;
		}
		if self.no_web {
			settings.web.enabled = false;
		}
		settings
	}
}

/// Main entry point for the server.
///
/// Loads the dictionary (fatal on failure), starts the counter actor with
/// the model loading in the background, and serves the HTTP API.
///
/// # Notes
/// - The server binds to `web.host:web.port` (127.0.0.1:4000 by default).
/// - Requests are accepted while the model loads; fallback words are then
///   answered with `model_not_loaded`.
/// - Without the web server, the benchmark waits for the model first.
#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let args = Args::parse();
	let settings = Settings::load(args.config.as_deref())?;
	let settings = args.apply(settings);
	settings.validate()?;

	let dictionary = if settings.dictionary.cache {
		PronunciationDictionary::load_cached(&settings.dictionary.path)?
	} else {
		PronunciationDictionary::load(&settings.dictionary.path)?
	};

	let service = SyllableService::start(Arc::new(dictionary), settings.model_source(), settings.request_timeout())?;

	if !settings.web.enabled {
		info!("web server disabled, running benchmark once");
		let timeout = settings.request_timeout();
		let report = web::block(move || {
			service.wait_for_model(timeout);
			service.benchmark()
		})
		.await??;
		println!("{}", serde_json::to_string_pretty(&report)?);
		if !report.all_counted() {
			warn!("some benchmark words could not be counted");
		}
		return Ok(());
	}

	let shared_state = web::Data::new(AppState { service });
	let (host, port) = (settings.web.host.clone(), settings.web.port);
	info!("listening on http://{host}:{port}");

	HttpServer::new(move || {
		App::new()
			.app_data(shared_state.clone())
			.wrap(Cors::permissive())
			.wrap(middleware::Logger::default())
			.configure(routes::configure)
			.default_service(web::to(routes::not_found))
	})
	.bind((host, port))?
	.run()
	.await?;

	Ok(())
}
