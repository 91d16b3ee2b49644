use fluency_config::Config;
use fluency_session::SessionManager;
use tracing::info;

/// Strategy for displaying configuration information.
///
/// Prints the effective configuration (API key masked) and checks that
/// the conversation database is reachable.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;

        println!("=== fluency Configuration ===\n");

        println!("API Key:");
        println!("  Groq: {}", mask_secret(&config.providers.groq.api_key));
        if let Some(ref base_url) = config.providers.groq.base_url {
            println!("  Base URL: {base_url}");
        }
        println!();

        println!("Database:");
        let db_url = &config.database.url;
        println!("  URL: {}", mask_database_url(db_url));

        info!("Testing database connection");
        match SessionManager::new(db_url).await {
            Ok(_) => println!("  Status: Connected"),
            Err(e) => {
                println!("  Status: Connection failed");
                println!("  Error: {e}");
            }
        }
        println!();

        let therapist = &config.therapist;
        println!("Therapist:");
        println!("  Model: {}", therapist.model);
        println!("  Max Tokens: {}", therapist.max_tokens);
        println!("  Temperature: {}", therapist.temperature);
        if let Some(ref prompt) = therapist.system_prompt {
            println!("  System Prompt: {}", truncate(prompt, 60));
        }
        match therapist.history_limit {
            Some(limit) => println!("  History Limit: {limit} exchanges"),
            None => println!("  History Limit: (full history)"),
        }
        if let Some(ref reply) = therapist.empty_transcript_reply {
            println!("  Empty Transcript Reply: {reply}");
        }
        println!();

        println!("Transcription:");
        println!("  Model: {}", config.transcription.model);
        println!("  Language: {}", config.transcription.language);
        println!();

        println!("Speech:");
        println!("  Language: {}", config.speech.language);
        println!("  Host: translate.google.{}", config.speech.tld);
        println!("  Slow: {}", config.speech.slow);
        println!();

        println!("Server:");
        println!("  Bind: {}", config.server.bind);
        println!("  Request Timeout: {}s", config.request_timeout_secs);
        match config.artifact_dir {
            Some(ref dir) => println!("  Artifact Dir: {}", dir.display()),
            None => println!("  Artifact Dir: (system temp)"),
        }

        Ok(())
    }
}

fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}

fn mask_database_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };

    let Some((credentials, after_at)) = rest.split_once('@') else {
        return url.to_string();
    };

    let Some((username, _password)) = credentials.split_once(':') else {
        return url.to_string();
    };

    format!("{scheme}://{username}:***@{after_at}")
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
