use anyhow::{Context, Result};
use console::Style;
use tracing::info;

use clabot::committers::{CommitterPipeline, PipelineResult};

use crate::args::{CommittersArgs, GlobalArgs, Reportable};
use crate::util;

pub fn run(global_args: &GlobalArgs, args: &CommittersArgs) -> Result<()> {
    let (client, credential) = util::gitlab_client(global_args)?;
    let runtime = util::runtime()?;

    let pipeline =
        CommitterPipeline::new(&client, &client).external_provider(args.external_provider.as_str());
    let result = runtime
        .block_on(pipeline.resolve(args.project, args.merge_request, &credential))
        .with_context(|| {
            format!(
                "Failed to determine the committers of merge request !{} of project {}",
                args.merge_request, args.project
            )
        })?;
    info!(
        "{} committers to verify, {} unresolved",
        result.distinct_users_to_verify.len(),
        result.unresolved_login_names.len()
    );

    CommittersReporter(result).report(&args.output_args)
}

struct CommittersReporter(PipelineResult);

impl Reportable for CommittersReporter {
    fn human_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        let result = &self.0;
        let heading = Style::new().bold();
        let unresolved = Style::new().yellow();

        if result.distinct_users_to_verify.is_empty() && result.unresolved_login_names.is_empty() {
            writeln!(writer, "No committers found")?;
            return Ok(());
        }

        if !result.distinct_users_to_verify.is_empty() {
            writeln!(writer, "{}", heading.apply_to("Committers"))?;
            for c in result.distinct_users_to_verify.iter() {
                write!(writer, "  {} <{}>: @{}", c.name, c.email, c.login)?;
                if let Some(id) = &c.external_id {
                    write!(writer, " ({id})")?;
                }
                writeln!(writer)?;
            }
        }

        if !result.unresolved_login_names.is_empty() {
            if !result.distinct_users_to_verify.is_empty() {
                writeln!(writer)?;
            }
            writeln!(writer, "{}", heading.apply_to("Unresolved committers"))?;
            for name in result.unresolved_login_names.iter() {
                writeln!(writer, "  {}", unresolved.apply_to(name))?;
            }
        }
        Ok(())
    }

    fn json_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, &self.0)?;
        writeln!(writer)?;
        Ok(())
    }
}
