use anyhow::{bail, Context, Result};
use harvest_core::{CallerError, ChannelContext, Credential, Snowflake, StopReason};
use harvest_engine::{
    export_file_stem, EngineEvent, EngineHandle, Exporter, FileExporter, HarvestError,
    HarvestOutcome, HarvestProgress,
};
use harvest_logging::{harvest_info, harvest_warn};

use crate::config::AppConfig;
use crate::{ChannelsArgs, RangeArgs};

/// Terminal output that is not logging.
pub struct Ui {
    pub quiet: bool,
}

impl Ui {
    fn status(&self, line: impl AsRef<str>) {
        if !self.quiet {
            eprintln!("{}", line.as_ref());
        }
    }

    fn progress(&self, progress: &HarvestProgress) {
        let retries = match progress.rate_limit_retries {
            0 => String::new(),
            n => format!(", {n} rate-limit waits"),
        };
        self.status(format!(
            "request #{}: {} messages in {} ms, {} kept so far{}",
            progress.request_number,
            progress.page_len,
            progress.elapsed_ms,
            progress.collected_count,
            retries
        ));
    }
}

pub fn range(config: &AppConfig, ui: &Ui, args: RangeArgs, token: Option<String>) -> Result<()> {
    let (guild, channel_id) = match &args.channel_url {
        Some(url) => {
            let context = ChannelContext::from_url(url)?;
            (context.guild, context.channel.map(|c| c.to_string()))
        }
        None => {
            let guild = args.guild.as_deref().unwrap_or(harvest_core::DIRECT_MESSAGES_GUILD);
            (ChannelContext::new(guild, None)?.guild, args.channel)
        }
    };

    let request = config
        .harvest_input(channel_id, token.map(Credential::new), args.start, args.end)
        .validate()?;
    let stem = export_file_stem(&guild, request.channel_id(), request.range());

    let engine = EngineHandle::new(config.transport_settings(), config.fetch_settings())
        .context("failed to set up the HTTP client")?
        .stop_on_interrupt();
    engine.start_harvest(request)?;
    ui.status("Harvesting; press Ctrl-C to stop after the current request");

    let outcome = loop {
        match engine.recv() {
            Some(EngineEvent::Progress(progress)) => ui.progress(&progress),
            Some(EngineEvent::RateLimited { wait, .. }) => {
                ui.status(format!("rate limited, retrying in {} ms", wait.as_millis()))
            }
            Some(EngineEvent::HarvestCompleted(outcome)) => break *outcome,
            Some(_) => {}
            None => bail!("the harvest engine stopped unexpectedly"),
        }
    };
    report_outcome(config, ui, &stem, outcome)
}

fn report_outcome(config: &AppConfig, ui: &Ui, stem: &str, outcome: HarvestOutcome) -> Result<()> {
    let HarvestOutcome { session, result } = outcome;
    let collected = session.collected().len();
    let attempts = session.attempt_count();

    match session.stop_reason() {
        Some(StopReason::AttemptCapReached) => {
            harvest_warn!("Stopped after reaching the cap of {} requests", attempts)
        }
        Some(StopReason::Stagnated) => {
            harvest_warn!("The remote stopped returning older messages")
        }
        _ => {}
    }

    match result {
        Ok(messages) => {
            let summary = FileExporter::new(config.output_dir.clone(), stem)
                .export(&messages, config.format)?;
            if session.stop_reason() == Some(StopReason::Cancelled) {
                ui.status("Harvest cancelled, but both anchors had already been collected");
            }
            harvest_info!(
                "Wrote {} bytes to {}",
                summary.bytes_written,
                summary.output_path.display()
            );
            println!(
                "Exported {} messages ({}) to {}",
                summary.message_count,
                summary.format,
                summary.output_path.display()
            );
            Ok(())
        }
        Err(HarvestError::Consistency(err)) => {
            let missing = err.missing_ends();
            let ends = missing
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" and ");
            let not_reached = if missing.len() > 1 {
                "anchors were"
            } else {
                "anchor was"
            };
            if session.stop_reason() == Some(StopReason::Cancelled) {
                bail!(
                    "harvest cancelled after {attempts} requests; {collected} messages salvaged, \
                     but the {ends} {not_reached} not reached, so nothing was exported"
                );
            }
            bail!("{err}; {collected} messages were collected, nothing was exported")
        }
        Err(HarvestError::Remote(err)) => {
            let hint = if err.kind.is_wrong_context() {
                " (check the channel id and that the account can read it)"
            } else {
                ""
            };
            bail!(
                "harvest failed on request #{attempts}{hint}: {err}; \
                 {collected} messages were collected before the failure"
            )
        }
        Err(HarvestError::Caller(err)) => Err(err.into()),
    }
}

pub fn channels(
    config: &AppConfig,
    ui: &Ui,
    args: ChannelsArgs,
    token: Option<String>,
) -> Result<()> {
    let context = match (&args.channel_url, &args.guild) {
        (Some(url), _) => ChannelContext::from_url(url)?,
        (None, Some(guild)) => ChannelContext::new(guild, None)?,
        (None, None) => bail!("a guild id or channel URL is required"),
    };
    if context.is_direct_messages() {
        bail!("direct messages have no channel list");
    }
    let guild_id = Snowflake::parse(&context.guild)
        .map_err(|source| CallerError::MalformedId { field: "guild id", source })?;
    let credential = token.map(Credential::new).ok_or(CallerError::MissingCredential)?;

    let engine = EngineHandle::new(config.transport_settings(), config.fetch_settings())
        .context("failed to set up the HTTP client")?;
    engine.list_channels(guild_id, credential);

    loop {
        match engine.recv() {
            Some(EngineEvent::ChannelsListed { guild_id, result }) => {
                let channels = result?;
                ui.status(format!("{} text channels in guild {}", channels.len(), guild_id));
                for channel in channels {
                    println!("{}\t#{}", channel.id, channel.name);
                }
                return Ok(());
            }
            Some(EngineEvent::RateLimited { wait, .. }) => {
                ui.status(format!("rate limited, retrying in {} ms", wait.as_millis()))
            }
            Some(_) => {}
            None => bail!("the harvest engine stopped unexpectedly"),
        }
    }
}
