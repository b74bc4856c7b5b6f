use std::path::PathBuf;

use bussy::config::{ClientConfig, ConfigError, normalize_api_url, parse_credential};
use bussy::directory::{ImageUpload, NewBusiness, NewReview, SearchQuery, ValidationError, filter_businesses};
use bussy::net::{ApiError, HttpApi};
use bussy::session::callback::CallbackError;
use bussy::session::credential::{BearerToken, CookieSession, Credential, CredentialKind, CredentialStrategy};
use bussy::session::token_store::FileTokenStore;
use bussy::session::{NavigationError, Navigator, SessionStore};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("{0}")]
    Callback(#[from] CallbackError),
    #[error("{0}")]
    Navigation(#[from] NavigationError),
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("not signed in ({0}); run `bussy login`")]
    NotSignedIn(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "bussy", about = "Bussy local-business directory CLI")]
struct Cli {
    /// API origin. Overrides `BUSSY_API_URL`.
    #[arg(long, env = "BUSSY_API_URL")]
    api_url: Option<String>,

    /// `token` or `cookie`. Overrides `BUSSY_CREDENTIAL`.
    #[arg(long, env = "BUSSY_CREDENTIAL")]
    credential: Option<String>,

    /// Log at debug level to stderr.
    #[arg(long, short, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the sign-in URL to open in a browser.
    Login,
    /// Finish sign-in with the URL the browser was redirected to.
    Callback { url: String },
    /// Show the signed-in user.
    Whoami,
    Logout,
    /// List businesses, optionally filtered by category and address.
    Businesses(SearchArgs),
    /// Show one business with its reviews.
    Show { business_id: String },
    /// Review a business as the signed-in user.
    Review(ReviewArgs),
    /// Create a listing as the signed-in user.
    AddBusiness(AddBusinessArgs),
    /// Reviews written by the signed-in user.
    MyReviews,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[arg(long, default_value = "")]
    category: String,

    #[arg(long, default_value = "")]
    address: String,

    #[arg(long, default_value_t = false, help = "Fetch everything and filter locally")]
    local_filter: bool,
}

#[derive(Args, Debug)]
struct ReviewArgs {
    business_id: String,

    #[arg(long)]
    rating: u8,

    #[arg(long)]
    comment: String,
}

#[derive(Args, Debug)]
struct AddBusinessArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    category: String,

    #[arg(long)]
    address: String,

    #[arg(long, default_value = "")]
    phone: String,

    #[arg(long, default_value = "")]
    website: String,

    #[arg(long, default_value = "")]
    promotion: String,

    #[arg(long, help = "Image file, at most 5 MiB")]
    image: Option<PathBuf>,
}

/// Terminal stand-in for a browser redirect.
struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn navigate(&self, url: &str) -> Result<(), NavigationError> {
        println!("{url}");
        eprintln!("Open the URL above, then run `bussy callback <redirected-url>`.");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt().with_writer(std::io::stderr).with_max_level(level).init();

    let mut config = ClientConfig::from_env()?;
    if let Some(api_url) = &cli.api_url {
        config.api_url = normalize_api_url(api_url);
    }
    if cli.credential.is_some() {
        config.credential = parse_credential(cli.credential.as_deref())?;
    }
    let api = HttpApi::new(&config)?;

    match config.credential {
        CredentialKind::CookieSession => run(SessionStore::new(api, CookieSession), cli.command).await,
        CredentialKind::BearerToken => {
            let tokens = FileTokenStore::new(config.token_path);
            run(SessionStore::new(api, BearerToken::new(tokens)), cli.command).await
        }
    }
}

async fn run<C: CredentialStrategy>(store: SessionStore<HttpApi, C>, command: Command) -> Result<(), CliError> {
    match command {
        Command::Login => {
            store.login(&PrintNavigator)?;
            Ok(())
        }
        Command::Callback { url } => {
            let outcome = store.complete_redirect(&url).await?;
            eprintln!("callback handled; continue at {}", outcome.clean_url);
            match outcome.session.identity() {
                Some(identity) => print_json(&serde_json::to_value(identity)?),
                None => Err(not_signed_in(outcome.session.last_error())),
            }
        }
        Command::Whoami => {
            let session = store.initialize().await;
            match session.identity() {
                Some(identity) => print_json(&serde_json::to_value(identity)?),
                None => Err(not_signed_in(session.last_error())),
            }
        }
        Command::Logout => {
            let session = store.logout().await;
            if let Some(error) = session.last_error() {
                eprintln!("signed out locally; server said: {error}");
            } else {
                eprintln!("signed out");
            }
            Ok(())
        }
        Command::Businesses(args) => run_businesses(store.api(), args).await,
        Command::Show { business_id } => {
            let business = store.api().get_business(&business_id).await?;
            let reviews = store.api().business_reviews(&business_id).await?;
            print_json(&json!({
                "business": business,
                "rating": business.rating_label(),
                "reviews": reviews,
            }))
        }
        Command::Review(args) => {
            let review = NewReview::new(args.business_id, args.rating, args.comment)?;
            let credential = require_credential(&store).await?;
            let stored = store.api().post_review(&credential, &review).await.map_err(refused_as_signed_out)?;
            print_json(&serde_json::to_value(stored)?)
        }
        Command::AddBusiness(args) => {
            let business = new_business(args)?;
            let credential = require_credential(&store).await?;
            let created = store.api().create_business(&credential, &business).await.map_err(refused_as_signed_out)?;
            print_json(&serde_json::to_value(created)?)
        }
        Command::MyReviews => {
            let credential = require_credential(&store).await?;
            let reviews = store.api().my_reviews(&credential).await.map_err(refused_as_signed_out)?;
            print_json(&serde_json::to_value(reviews)?)
        }
    }
}

async fn run_businesses(api: &HttpApi, args: SearchArgs) -> Result<(), CliError> {
    let query = SearchQuery::new(args.category, args.address);
    let value = if args.local_filter {
        let all = api.list_businesses(&SearchQuery::default()).await?;
        serde_json::to_value(filter_businesses(&all, &query))?
    } else {
        serde_json::to_value(api.list_businesses(&query).await?)?
    };
    print_json(&value)
}

/// Gate a write on a verified session and return the credential to attach.
async fn require_credential<C: CredentialStrategy>(store: &SessionStore<HttpApi, C>) -> Result<Credential, CliError> {
    let session = store.initialize().await;
    if !session.is_authenticated() {
        return Err(not_signed_in(session.last_error()));
    }
    store.credential().ok_or_else(|| not_signed_in(None))
}

fn new_business(args: AddBusinessArgs) -> Result<NewBusiness, CliError> {
    let image = args.image.as_deref().map(ImageUpload::from_path).transpose()?;
    let business = NewBusiness {
        name: args.name,
        category: args.category,
        formatted_address: args.address,
        phone_number: args.phone,
        website: args.website,
        promotion: args.promotion,
        image,
    };
    business.validate()?;
    Ok(business)
}

fn not_signed_in(last_error: Option<&str>) -> CliError {
    CliError::NotSignedIn(last_error.unwrap_or("no session").to_owned())
}

/// A 401/403 on an authenticated call means the server dropped the session.
fn refused_as_signed_out(error: ApiError) -> CliError {
    if error.is_unauthorized() { CliError::NotSignedIn(error.to_string()) } else { CliError::Api(error) }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
