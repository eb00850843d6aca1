use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use yolodetect::app::channel::{MethodCall, MethodResult, DETECT_OBJECTS, LOAD_MODEL};
use yolodetect::app::config::AppConfig;
use yolodetect::app::App;

#[derive(Parser, Debug)]
#[command(name = "yolodetect", about = "Run YOLO object detection on images")]
struct Args {
    /// YAML configuration file; defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(required = true)]
    images: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };

    let app = App::start(config).await?;
    match app.handle(&MethodCall::new(LOAD_MODEL, json!(null))).await {
        MethodResult::Success(loaded) if loaded == json!(true) => {}
        _ => {
            tracing::error!("model could not be loaded");
            app.stop().await;
            return Err("model could not be loaded".into());
        }
    }

    // Submitted together; the worker runs them one at a time.
    let calls = args.images.iter().map(|path| {
        let app = &app;
        async move {
            let call = match std::fs::read(path) {
                Ok(bytes) => MethodCall::new(DETECT_OBJECTS, json!({ "image": bytes })),
                Err(err) => {
                    tracing::error!(path = %path.display(), %err, "could not read image");
                    MethodCall::new(DETECT_OBJECTS, json!(null))
                }
            };
            (path, app.handle(&call).await)
        }
    });
    for (path, result) in futures::future::join_all(calls).await {
        println!("{}", json!({ "image": path.display().to_string(), "response": result }));
    }

    app.stop().await;
    Ok(())
}
