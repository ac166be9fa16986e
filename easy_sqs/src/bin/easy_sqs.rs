use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use easy_sqs::cli::Args;
use easy_sqs::config::{build_s3_client, build_sqs_client, load_aws_config, Settings};
use easy_sqs::dispatch::{Dispatcher, MessageInput};
use easy_sqs::logging;
use easy_sqs::offload::{OffloadingSender, S3PayloadStore};
use easy_sqs::sqs::{QueueSender, SqsQueueSender};
use tracing::{debug, error, info, info_span};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = logging::init(args.debug) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    debug!(?args, "arguments");

    let mut settings = Settings::load(&args.properties, &args.properties_section)?;
    settings.apply_overrides(args.overrides.values());
    debug!(?settings, "resolved parameters");

    // Inputs first: a bad file must fail before anything touches AWS.
    let input = MessageInput::load(&settings)?;
    let queue_url = settings.queue_url()?.to_string();

    let shared = load_aws_config(&settings).await;
    let sqs_sender = SqsQueueSender::new(build_sqs_client(&shared));
    let sender: Box<dyn QueueSender> = match settings.s3_bucket() {
        Some(bucket) => {
            debug!(bucket, "large payload support enabled");
            let store = S3PayloadStore::new(build_s3_client(&shared, &settings));
            Box::new(OffloadingSender::new(sqs_sender, store, bucket))
        }
        None => Box::new(sqs_sender),
    };

    let span = info_span!("publish", queue = %queue_url);
    let report = Dispatcher::new(sender.as_ref(), span)
        .dispatch(&settings, &input)
        .await
        .with_context(|| format!("publishing to {queue_url}"))?;

    info!(
        sent = report.message_ids.len(),
        group = %report.group_id,
        "done"
    );
    Ok(())
}
