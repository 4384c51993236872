use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use welcome_core::{FaceObservation, IdentityStore, SqliteIdentityStore};

#[zbus::proxy(
    interface = "org.welcome.Greeter1",
    default_service = "org.welcome.Greeter1",
    default_path = "/org/welcome/Greeter1"
)]
trait Greeter {
    fn report_observations(&self, observations: &str) -> zbus::Result<bool>;
    fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "welcome", about = "Welcome robot greeting CLI")]
struct Cli {
    /// Identity database (defaults to $WELCOME_DB_PATH or the data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Talk to the daemon on the system bus instead of the session bus
    #[arg(long, global = true)]
    system: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List remembered visitors
    List,
    /// Show the name stored for a face id
    Get { face_id: String },
    /// Remember a visitor under a face id (replaces any existing name)
    Set { face_id: String, name: String },
    /// Forget a visitor
    Remove { face_id: String },
    /// Report a visible face to the running daemon
    Observe {
        /// Face id of a registered visitor; omit for a stranger
        #[arg(long)]
        face_id: Option<String>,
        /// Bounding box width in pixels
        #[arg(long)]
        width: u32,
        /// Distance in meters
        #[arg(long)]
        distance: f32,
        #[arg(long, default_value = "cli")]
        person_id: String,
    },
    /// Show daemon status
    Status,
}

fn db_path(cli_db: Option<PathBuf>) -> PathBuf {
    cli_db
        .or_else(|| std::env::var("WELCOME_DB_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(welcome_core::default_db_path)
}

fn open_store(cli_db: Option<PathBuf>) -> Result<SqliteIdentityStore> {
    let path = db_path(cli_db);
    SqliteIdentityStore::open(&path)
        .with_context(|| format!("failed to open identity store at {}", path.display()))
}

async fn greeter(system: bool) -> Result<GreeterProxy<'static>> {
    let connection = if system {
        zbus::Connection::system().await?
    } else {
        zbus::Connection::session().await?
    };
    let proxy = GreeterProxy::new(&connection)
        .await
        .context("welcomed is not reachable on D-Bus")?;
    Ok(proxy)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            let records = open_store(cli.db)?.list()?;
            if records.is_empty() {
                println!("No visitors remembered");
            }
            for r in records {
                println!("{}\t{}\t{}", r.face_id, r.display_name, r.created_at);
            }
        }
        Commands::Get { face_id } => match open_store(cli.db)?.get(&face_id)? {
            Some(name) => println!("{name}"),
            None => println!("No visitor with face id {face_id}"),
        },
        Commands::Set { face_id, name } => {
            if face_id.is_empty() || name.trim().is_empty() {
                anyhow::bail!("face id and name must not be empty");
            }
            open_store(cli.db)?.set(&face_id, name.trim())?;
            println!("Remembered {face_id} as {}", name.trim());
        }
        Commands::Remove { face_id } => {
            if open_store(cli.db)?.delete(&face_id)? {
                println!("Forgot {face_id}");
            } else {
                println!("No visitor with face id {face_id}");
            }
        }
        Commands::Observe {
            face_id,
            width,
            distance,
            person_id,
        } => {
            let observation = FaceObservation {
                face_id,
                bounding_box_width: width,
                distance_m: distance,
                person_id,
            };
            let payload = serde_json::to_string(&[observation])?;
            tracing::debug!(payload = %payload, "reporting observation");
            let accepted = greeter(cli.system).await?.report_observations(&payload).await?;
            if accepted {
                println!("Observation delivered");
            } else {
                println!("Observation rejected by welcomed");
            }
        }
        Commands::Status => {
            let raw = greeter(cli.system).await?.status().await?;
            let status: serde_json::Value = serde_json::from_str(&raw)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
