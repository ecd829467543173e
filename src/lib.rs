mod advisory;
mod config;
mod db;
mod gemini;
mod logging;
mod profile;
mod prompts;
mod session;

pub use advisory::{
    extract_text, AdvisoryClient, AdvisoryResult, FailureReason, GenerationParams, ParamError,
    RetryCause, RetryNotice, RetryPolicy,
};
pub use config::{AppConfig, ConfigError, FileConfig};
pub use db::{ProfileStore, StorageError};
pub use gemini::{
    Candidate, CandidateContent, GeminiClient, GenerationRequest, GenerationResponse,
    GenerationService, ResponsePart, ServiceError,
};
pub use profile::{ExperienceLevel, FarmerProfile, FarmingType, PreferredLanguage, ProfileError};
pub use prompts::{build_advisory_prompt, Challenge, Question};
pub use session::Session;

use std::io::Write;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Please log in first.")]
    NotLoggedIn,
    #[error("User not found. Please sign up first.")]
    UserNotFound(String),
    #[error("Please enter or select a question.")]
    EmptyQuestion,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Params(#[from] ParamError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Failed to serialize profile: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============ App Initialization ============

/// Start logging and open the profile store.
pub fn init_app(config: &AppConfig) -> Result<ProfileStore, AppError> {
    if let Err(e) = logging::init_logging(config.log_dir.clone()) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    let _ = logging::cleanup_old_logs(&config.log_dir);

    let store = ProfileStore::open(&config.db_path).map_err(|e| {
        logging::log_error(None, &format!("Failed to open profile store: {}", e));
        e
    })?;
    logging::log_session(
        None,
        &format!("Profile store ready at {}", config.db_path.display()),
    );

    Ok(store)
}

// ============ Profiles & Sessions ============

/// Create or fully replace the profile, then log the farmer in.
pub fn sign_up(
    session: &mut Session,
    store: &ProfileStore,
    profile: &FarmerProfile,
) -> Result<(), AppError> {
    store.upsert(profile).map_err(|e| {
        logging::log_error(Some(session.id()), &format!("Sign-up failed: {}", e));
        e
    })?;
    session.set_user(&profile.name);
    logging::log_profile(Some(session.id()), &format!("Profile saved for {}", profile.name));
    Ok(())
}

pub fn login(
    session: &mut Session,
    store: &ProfileStore,
    name: &str,
) -> Result<FarmerProfile, AppError> {
    let name = name.trim();
    match store.find_by_name(name)? {
        Some(profile) => {
            session.set_user(&profile.name);
            logging::log_session(Some(session.id()), &format!("{} logged in", profile.name));
            Ok(profile)
        }
        None => {
            logging::log_session(Some(session.id()), &format!("Unknown user '{}'", name));
            Err(AppError::UserNotFound(name.to_string()))
        }
    }
}

pub fn logout(session: &mut Session) {
    if let Some(name) = session.clear_user() {
        logging::log_session(Some(session.id()), &format!("{} logged out", name));
    }
}

/// Fresh read of the logged-in farmer's profile.
pub fn current_profile(session: &Session, store: &ProfileStore) -> Result<FarmerProfile, AppError> {
    let name = session.current_user().ok_or(AppError::NotLoggedIn)?;
    store
        .find_by_name(name)?
        .ok_or_else(|| AppError::UserNotFound(name.to_string()))
}

/// Profile for the logged-in farmer, or `None` after logging out a session
/// whose profile is no longer stored.
pub fn resume_session(
    session: &mut Session,
    store: &ProfileStore,
) -> Result<Option<FarmerProfile>, AppError> {
    match current_profile(session, store) {
        Ok(profile) => Ok(Some(profile)),
        Err(AppError::UserNotFound(name)) => {
            logging::log_session(
                Some(session.id()),
                &format!("Profile for {} no longer exists, ending login", name),
            );
            logout(session);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// The logged-in profile as pretty JSON.
pub fn view_profile(session: &Session, store: &ProfileStore) -> Result<String, AppError> {
    let profile = current_profile(session, store)?;
    Ok(serde_json::to_string_pretty(&profile)?)
}

// ============ Advisory ============

/// Build the prompt from the stored profile and ask for advice.
///
/// Storage and session problems are `Err`; anything the generation service
/// did is inside the returned `AdvisoryResult`.
pub async fn request_advice<S: GenerationService>(
    session: &Session,
    store: &ProfileStore,
    client: &AdvisoryClient<S>,
    question: &Question,
    params: GenerationParams,
) -> Result<AdvisoryResult, AppError> {
    let profile = current_profile(session, store)?;
    if question.is_blank() {
        return Err(AppError::EmptyQuestion);
    }

    let prompt = build_advisory_prompt(&profile, question.text());
    logging::log_advisory(
        Some(session.id()),
        &format!(
            "Advisory requested by {} (temperature {:.1}, max tokens {})",
            profile.name,
            params.temperature(),
            params.max_output_tokens()
        ),
    );

    let result = client.generate(&prompt, params).await;
    match &result {
        Ok(text) => logging::log_advisory(
            Some(session.id()),
            &format!("Advisory ready ({} chars)", text.chars().count()),
        ),
        Err(reason) => logging::log_advisory(Some(session.id()), &format!("Advisory failed: {}", reason)),
    }

    Ok(result)
}

/// Parse a new creativity setting, keeping the token limit.
pub fn adjust_temperature(
    session: &Session,
    params: GenerationParams,
    text: &str,
) -> Result<GenerationParams, ParamError> {
    let text = text.trim();
    let temperature: f32 = text
        .parse()
        .map_err(|_| ParamError::NotANumber(text.to_string()))?;
    let updated = params.with_temperature(temperature)?;
    logging::log_advisory(
        Some(session.id()),
        &format!("Temperature set to {:.1}", updated.temperature()),
    );
    Ok(updated)
}

/// Check the configured Gemini key with a minimal request.
pub async fn validate_api_key(config: &AppConfig) -> Result<bool, AppError> {
    let client = GeminiClient::new(&config.api_key, &config.model)?;
    Ok(client.validate_api_key().await?)
}

// ============ Run ============

type Input = Lines<BufReader<Stdin>>;

async fn prompt_line(input: &mut Input, label: &str) -> Result<Option<String>, AppError> {
    print!("{}", label);
    std::io::stdout().flush()?;
    Ok(input.next_line().await?.map(|line| line.trim().to_string()))
}

async fn choose<T: Copy>(
    input: &mut Input,
    label: &str,
    options: &[T],
    name: fn(&T) -> &'static str,
) -> Result<Option<T>, AppError> {
    println!("{}", label);
    for (i, option) in options.iter().enumerate() {
        println!("  {}) {}", i + 1, name(option));
    }
    loop {
        let Some(line) = prompt_line(input, "> ").await? else {
            return Ok(None);
        };
        match line.parse::<usize>() {
            Ok(n) if (1..=options.len()).contains(&n) => return Ok(Some(options[n - 1])),
            _ => println!("Pick a number between 1 and {}.", options.len()),
        }
    }
}

async fn sign_up_form(input: &mut Input) -> Result<Option<FarmerProfile>, AppError> {
    println!("🧾 Farmer Details");
    let Some(name) = prompt_line(input, "Name: ").await? else {
        return Ok(None);
    };
    let Some(district) = prompt_line(input, "District: ").await? else {
        return Ok(None);
    };
    let Some(age) = prompt_line(input, "Age: ").await? else {
        return Ok(None);
    };
    let Some(language) = choose(input, "Preferred Language:", &PreferredLanguage::ALL, PreferredLanguage::as_str).await? else {
        return Ok(None);
    };
    let Some(farming_type) = choose(input, "Type of Farming:", &FarmingType::ALL, FarmingType::as_str).await? else {
        return Ok(None);
    };
    let Some(experience) = choose(input, "Experience Level:", &ExperienceLevel::ALL, ExperienceLevel::as_str).await? else {
        return Ok(None);
    };

    let age: i64 = match age.parse() {
        Ok(age) => age,
        Err(_) => {
            println!("Age must be a whole number.");
            return Ok(None);
        }
    };

    match FarmerProfile::new(&name, &district, age, language, farming_type, experience) {
        Ok(profile) => Ok(Some(profile)),
        Err(e) => {
            println!("{}", e);
            Ok(None)
        }
    }
}

/// Terminal front end: login or sign up, then ask for advice until quit.
pub async fn run() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let store = init_app(&config)?;
    let mut params = GenerationParams::new(config.temperature, config.max_output_tokens)?;

    let mut client = AdvisoryClient::new(GeminiClient::new(&config.api_key, &config.model)?)
        .with_notifier(|notice| println!("{}", notice.message()));
    if config.cache_responses {
        client = client.with_response_cache();
    }

    let mut session = Session::new();
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    println!("🌴 Smart Farming AI Assistant — Kerala Edition");
    println!(
        "Creativity (temperature): {:.1} | Max Output Tokens: {}",
        params.temperature(),
        params.max_output_tokens()
    );

    loop {
        if !session.is_logged_in() {
            let Some(choice) = prompt_line(&mut input, "\n1) Login  2) Sign Up  q) Quit\n> ").await? else {
                break;
            };
            match choice.as_str() {
                "1" => {
                    let Some(name) = prompt_line(&mut input, "Enter your name: ").await? else {
                        break;
                    };
                    match login(&mut session, &store, &name) {
                        Ok(profile) => println!("Welcome back, {}! 🌴", profile.name),
                        Err(e @ AppError::UserNotFound(_)) => println!("{}", e),
                        Err(e) => return Err(e),
                    }
                }
                "2" => {
                    if let Some(profile) = sign_up_form(&mut input).await? {
                        sign_up(&mut session, &store, &profile)?;
                        println!("Profile created successfully! 🌿");
                    }
                }
                "q" | "Q" => break,
                _ => println!("Select 1, 2 or q."),
            }
            continue;
        }

        let Some(profile) = resume_session(&mut session, &store)? else {
            println!("Your profile is no longer available. Please log in again.");
            continue;
        };
        println!("\n👋 Hello {} from {}!", profile.name, profile.district);
        println!(
            "Language: {} | Experience: {} Farmer",
            profile.language.as_str(),
            profile.experience.as_str()
        );

        let Some(choice) = prompt_line(
            &mut input,
            "1) Choose Challenge  2) Ask My Own Question  3) View My Profile  4) Logout  5) Adjust Creativity  q) Quit\n> ",
        )
        .await?
        else {
            break;
        };

        let question = match choice.as_str() {
            "1" => match choose(&mut input, "Select a challenge:", &Challenge::ALL, Challenge::title).await? {
                Some(challenge) => Question::Preset(challenge),
                None => break,
            },
            "2" => match prompt_line(&mut input, "Enter your farming question: ").await? {
                Some(text) => Question::Custom(text),
                None => break,
            },
            "3" => {
                match view_profile(&session, &store) {
                    Ok(json) => println!("{}", json),
                    Err(AppError::UserNotFound(_)) => {}
                    Err(e) => return Err(e),
                }
                continue;
            }
            "4" => {
                logout(&mut session);
                continue;
            }
            "5" => {
                let label = format!(
                    "Creativity (temperature 0.0-1.0, now {:.1}): ",
                    params.temperature()
                );
                let Some(text) = prompt_line(&mut input, &label).await? else {
                    break;
                };
                match adjust_temperature(&session, params, &text) {
                    Ok(updated) => {
                        params = updated;
                        println!("Creativity set to {:.1}", params.temperature());
                    }
                    Err(e) => println!("{}", e),
                }
                continue;
            }
            "q" | "Q" => break,
            _ => {
                println!("Select 1-5 or q.");
                continue;
            }
        };

        println!("🌿 Generating advisory...");
        match request_advice(&session, &store, &client, &question, params).await {
            Ok(Ok(text)) => println!("✅ AI Response Ready!\n\n{}", text),
            Ok(Err(reason)) => println!("{}", reason.user_message()),
            Err(AppError::EmptyQuestion) => println!("❗ Please enter or select a question."),
            Err(AppError::UserNotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }

    logging::log_session(Some(session.id()), "Session ended");
    Ok(())
}
