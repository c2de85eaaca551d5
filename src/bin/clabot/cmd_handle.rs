use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Read;
use tracing::debug;

use clabot::handler::Handler;
use clabot::webhook::WebhookEvent;

use crate::args::{GlobalArgs, HandleArgs, Reportable};
use crate::util;

pub fn run(global_args: &GlobalArgs, args: &HandleArgs) -> Result<()> {
    let input = {
        let mut reader = util::get_reader_for_file_or_stdin(args.input.as_ref())
            .context("Failed to open webhook event for reading")?;
        let mut input = String::new();
        reader
            .read_to_string(&mut input)
            .context("Failed to read webhook event")?;
        input
    };
    let event = WebhookEvent::from_json(&input).context("Failed to parse webhook event")?;
    debug!("Received webhook event of type {}", event.object_kind);

    let (client, credential) = util::gitlab_client(global_args)?;
    let runtime = util::runtime()?;
    let handler = Handler::new(&client, &client, &client, credential)
        .external_provider(args.external_provider.as_str());
    let message = runtime.block_on(handler.handle(&event))?;

    HandleReport { message }.report(&args.output_args)
}

#[derive(Serialize)]
struct HandleReport {
    message: String,
}

impl Reportable for HandleReport {
    fn human_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{}", self.message)?;
        Ok(())
    }

    fn json_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        Ok(())
    }
}
