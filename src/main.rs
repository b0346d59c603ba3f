use api::{discord, Assistant, Bank, Bot, Config, Control, Discord, Jokes, Lobby, OpenAi, RestartMode, Settings, Status};
use core::{convert::Infallible, str::FromStr, time::Duration};
use db::{ScoreLedger, UsageStats, UserMemory};
use http_body_util::BodyExt;
use hyper::{body::Bytes, server::conn::http1, service::service_fn, Request};
use hyper_util::rt::TokioIo;
use std::{env, net::Ipv4Addr, path::PathBuf, sync::Arc};
use tokio::{net::TcpListener, runtime::Runtime};

const FLUSH_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_MODEL: &str = "openai/gpt-oss-20b";
const DEFAULT_ROLE: &str = "You are a helpful assistant.";
const DEFAULT_PROMPT: &str = "Provide direct responses without showing your thinking process. \
    Do not include any deliberation, multiple options, or reasoning in your response. Just provide the final answer.";

/// Reads an optional environment variable, falling back to `default` when it is unset.
fn var_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => Ok(value.trim().parse()?),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err.into()),
    }
}

/// Reads an optional environment variable. Blank values count as unset.
fn var_opt(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Reads a yes/no environment flag. Unrecognized values fall back to `default`.
fn flag_or(key: &str, default: bool) -> bool {
    let Ok(value) = env::var(key) else {
        return default;
    };
    parse_flag(&value).unwrap_or_else(|| {
        log::warn!("{key} has unrecognized value {value:?}, using {default}");
        default
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Parse environment variables
    let token = var_opt("DISCORD_TOKEN")
        .or_else(|| var_opt("DISCORD_BOT_TOKEN"))
        .ok_or_else(|| anyhow::anyhow!("DISCORD_TOKEN is not set"))?;
    let port: u16 = var_or("PORT", 3000)?;
    let api_key: String = var_or("API_KEY", String::new())?;
    let data_dir: PathBuf = var_or("DATA_DIR", PathBuf::from("data"))?;
    let bank: PathBuf = var_or("QUIZ_BANK", PathBuf::from("quiz-questions.json"))?;
    let jokes: PathBuf = var_or("JOKES_FILE", PathBuf::from("jokes.json"))?;
    let window = var_or("QUIZ_ANSWER_SECONDS", 20)?;
    let cooldown = var_or("QUIZ_COOLDOWN_MINUTES", 60)?;
    let restart_mode: RestartMode = var_or("RESTART_MODE", RestartMode::Soft)?;
    let count_when_disabled = flag_or("COUNT_WHEN_DISABLED", true);

    // The assistant needs either a hosted API key or a local server
    let openai_key = var_opt("OPENAI_API_KEY");
    let local_url = var_opt("LM_STUDIO_API_URL");
    let settings = Settings {
        system_prompt: format!(
            "{} {}",
            var_opt("ASSISTANT_ROLE").as_deref().unwrap_or(DEFAULT_ROLE),
            var_opt("SYSTEM_PROMPT").as_deref().unwrap_or(DEFAULT_PROMPT),
        ),
        local: local_url.is_some(),
        facts_via_llm: flag_or("FACTS_VIA_LLM", false),
    };
    let llm = match (&openai_key, &local_url) {
        (None, None) => {
            log::warn!("neither OPENAI_API_KEY nor LM_STUDIO_API_URL is set: !llm is disabled");
            None
        }
        _ => {
            let model = var_opt("OPENAI_MODEL").unwrap_or_else(|| String::from(DEFAULT_MODEL));
            let llm = OpenAi::new(openai_key, &model, local_url.as_deref())?;
            log::info!("assistant uses model {}", llm.model());
            Some(llm)
        }
    };

    let runtime = Runtime::new()?;
    runtime.block_on(async move {
        // Wire up the shared state
        let status = Arc::new(Status::new(restart_mode));
        let stats = Arc::new(UsageStats::new(&data_dir));
        let ledger = Arc::new(ScoreLedger::new(&data_dir));
        let gateway = Arc::new(Discord::new(token.clone()));
        let lobby = Lobby::new(gateway, Bank::new(bank), Arc::clone(&ledger), Config::new(window, cooldown));
        let registry = Arc::clone(lobby.registry());

        let mut bot: Bot<Discord> = Bot::new(lobby, Arc::clone(&stats), Arc::clone(&status), count_when_disabled)
            .with_jokes(Jokes::new(jokes));
        if let Some(llm) = llm {
            let memory = Arc::new(UserMemory::new(&data_dir));
            bot = bot.with_assistant(Assistant::new(llm, memory, settings));
        }
        let bot = Arc::new(bot);

        let control =
            Arc::new(Control::new(api_key.into_boxed_str(), Arc::clone(&status), Arc::clone(&stats), ledger, registry));

        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        log::info!("control API listening on port {port}");

        // Chat gateway
        tokio::spawn(discord::listen(token, bot, Arc::clone(&status)));

        // Periodic persistence of the usage counters
        let flusher = Arc::clone(&stats);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(FLUSH_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(err) = flusher.flush().await {
                    log::error!("cannot persist usage statistics: {err}");
                }
            }
        });

        let stop = tokio::signal::ctrl_c();
        tokio::pin!(stop);

        loop {
            let stream = tokio::select! {
                biased;
                _ = &mut stop => break,
                _ = status.shutdown_requested() => {
                    log::info!("exiting for a hard restart");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => stream,
                    Err(err) => {
                        log::error!("cannot accept connection: {err}");
                        continue;
                    }
                },
            };

            let control = Arc::clone(&control);
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let control = Arc::clone(&control);
                async move {
                    let (parts, body) = req.into_parts();
                    let body = match body.collect().await {
                        Ok(body) => body.to_bytes(),
                        Err(err) => {
                            log::warn!("cannot read control request body: {err}");
                            Bytes::new()
                        }
                    };
                    let req = Request::from_parts(parts, body);
                    Ok::<_, Infallible>(control.respond(&req).await)
                }
            });

            tokio::spawn(async move {
                if let Err(err) = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await {
                    log::error!("control connection failed: {err}");
                }
            });
        }

        log::info!("shutting down");
        stats.flush().await?;
        anyhow::Ok(())
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_flag;

    #[test]
    fn reads_yes_no_flags() {
        for value in ["1", "true", "YES", "y", "On", " yes "] {
            assert_eq!(parse_flag(value), Some(true), "{value}");
        }
        for value in ["0", "false", "No", "n", "OFF"] {
            assert_eq!(parse_flag(value), Some(false), "{value}");
        }
        for value in ["", "maybe", "2"] {
            assert_eq!(parse_flag(value), None, "{value}");
        }
    }
}
