mod cache;
mod config;
mod conversation;
mod error;
mod recommendation;
mod session;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use structopt::StructOpt;
use tokio::io::AsyncBufRead;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::cache::{CachedRecommender, ResponseCache};
use crate::config::{Config, Environment};
use crate::recommendation::Recommender;
use crate::recommendation::groq::GroqRecommender;
use crate::session::Session;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "movie-recommendation-chat",
    about = "Chat with an LLM that recommends movies"
)]
struct Args {
    /// Path to a TOML file overriding model, endpoint and prompt settings
    #[structopt(short = "c", long)]
    config: Option<PathBuf>,

    /// Model to request completions from
    #[structopt(short = "m", long)]
    model: Option<String>,

    /// Send a single message, print the reply and exit
    #[structopt(long)]
    message: Option<String>,

    /// Reuse stored replies for prompts already asked with the same endpoint,
    /// model, temperature and max tokens
    #[structopt(long)]
    cache: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match try_main().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn try_main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    dotenv::dotenv().ok();
    let args = Args::from_args();
    let environment = envy::from_env::<Environment>()?;

    let mut config = match &args.config {
        Some(path) => Config::load(path).await?,
        None => Config::default(),
    };
    if let Some(model) = args.model {
        config.model = model;
    }

    let cache = if args.cache {
        Some(ResponseCache::new().await?)
    } else {
        None
    };

    let build = |api_key: String| -> Box<dyn Recommender> {
        let groq = GroqRecommender::new(api_key, &config);
        match cache {
            Some(cache) => Box::new(CachedRecommender::new(groq, cache, config.cache_scope())),
            None => Box::new(groq),
        }
    };

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    chat(
        environment,
        build,
        &config.prompt_template,
        args.message,
        stdin,
        &mut std::io::stdout(),
    )
    .await
}

/// Checks the API key, then runs one message or an interactive session.
/// Nothing is written to `output` when the key is missing.
async fn chat<R, B, I, O>(
    environment: Environment,
    build: B,
    prompt_template: &str,
    message: Option<String>,
    input: I,
    output: &mut O,
) -> anyhow::Result<()>
where
    R: Recommender,
    B: FnOnce(String) -> R,
    I: AsyncBufRead + Unpin,
    O: Write,
{
    let api_key = environment.api_key()?;
    let mut session = Session::new(build(api_key), prompt_template);

    match message {
        Some(message) => {
            let reply = session.submit(&message).await;
            writeln!(output, "{}", reply.text())?;
        }
        None => session.run(input, output).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PROMPT_TEMPLATE;
    use crate::error::ChatError;
    use crate::recommendation::testing::Scripted;
    use crate::session::TITLE;

    fn with_key(key: Option<&str>) -> Environment {
        Environment {
            groq_api_key: key.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn missing_key_halts_before_any_output() {
        let mut built = false;
        let mut output = Vec::new();
        let input: &[u8] = b"I like sci-fi\n";

        let error = chat(
            with_key(None),
            |_| {
                built = true;
                Scripted::replying("Try Blade Runner")
            },
            DEFAULT_PROMPT_TEMPLATE,
            None,
            input,
            &mut output,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            error.downcast_ref::<ChatError>(),
            Some(ChatError::ConfigurationMissing { .. })
        ));
        assert!(!built);
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn present_key_starts_interactive_session() {
        let mut output = Vec::new();
        let input: &[u8] = b"I like sci-fi\n";

        chat(
            with_key(Some("gsk-test")),
            |api_key| {
                assert_eq!(api_key, "gsk-test");
                Scripted::replying("Try Blade Runner")
            },
            DEFAULT_PROMPT_TEMPLATE,
            None,
            input,
            &mut output,
        )
        .await
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with(TITLE));
        assert!(output.contains("Chatbot: Try Blade Runner"));
    }

    #[tokio::test]
    async fn one_shot_message_prints_only_the_reply() {
        let mut output = Vec::new();
        let input: &[u8] = b"";

        chat(
            with_key(Some("gsk-test")),
            |_| Scripted::replying("Try Blade Runner"),
            DEFAULT_PROMPT_TEMPLATE,
            Some("I like sci-fi".to_owned()),
            input,
            &mut output,
        )
        .await
        .unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "Try Blade Runner\n");
    }
}
