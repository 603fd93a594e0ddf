use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use easy_chapters::chapters::{format_offset, parse_ffmetadata, parse_offset};
use easy_chapters::{
    locate_tool, ChapterId, ChapterWriter, Config, MediaInfo, MediaProbe, NextChapter, PlayerDelegate, Session,
};

#[derive(Parser)]
#[command(name = "easy-chapters")]
#[command(version, about = "View and edit chapter markers of video files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to easy-chapters.toml lookup)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the chapters file instead of rewriting the media
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List chapters
    List {
        media: PathBuf,
        /// Mark the chapter playing at this position
        #[arg(long)]
        at: Option<String>,
    },
    /// Print the FFMETADATA chapters document
    Export {
        media: PathBuf,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Add a chapter at a position (e.g. 00:01:30.500)
    Add {
        media: PathBuf,
        at: String,
        /// Title for the new chapter
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Rename chapter N (one-based)
    Rename { media: PathBuf, index: usize, name: String },
    /// Move chapter N to a new position
    Move { media: PathBuf, index: usize, at: String },
    /// Delete chapters by number
    Delete {
        media: PathBuf,
        #[arg(required = true)]
        indices: Vec<usize>,
    },
    /// Replace all chapters with those from an FFMETADATA file
    Apply { media: PathBuf, metadata: PathBuf },
    /// Edit chapters interactively
    Edit { media: PathBuf },
}

/// Tools and settings shared by every command
struct App {
    config: Config,
    probe: MediaProbe,
    writer: Option<ChapterWriter>,
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, load_error) = match &cli.config {
        Some(path) => (Config::from_file(path)?, None),
        None => config_or_default(Config::load()),
    };

    // Initialize logging
    let filter = if cli.verbose {
        "easy_chapters=debug,info".to_string()
    } else {
        format!("easy_chapters={},warn", config.logging.level)
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .init();

    if let Some(e) = load_error {
        warn!("Failed to load config, using defaults: {}", e);
    }

    config.validate()?;
    debug!("{}", config.summary());

    let app = App::new(config, cli.dry_run)?;

    match cli.command {
        Commands::List { media, at } => {
            let position = at.as_deref().map(parse_offset).transpose()?;
            let (session, _) = app.open(&media).await?;
            print_chapters(&session, position);
        }

        Commands::Export { media, output } => {
            let (session, _) = app.open(&media).await?;
            let document = session.store().to_ffmetadata();
            match output {
                Some(path) => {
                    tokio::fs::write(&path, format!("{}\n", document)).await?;
                    info!("📝 Chapters written to {}", path.display());
                }
                None => println!("{}", document),
            }
        }

        Commands::Add { media, at, name } => {
            let offset = parse_offset(&at)?;
            let (mut session, info) = app.open(&media).await?;
            let id = session.add(offset);
            if let Some(name) = name {
                session.rename(id, name);
            }
            app.save(&session, &info).await?;
        }

        Commands::Rename { media, index, name } => {
            let (mut session, info) = app.open(&media).await?;
            let id = chapter_at(&session, index)?;
            session.rename(id, name);
            app.save(&session, &info).await?;
        }

        Commands::Move { media, index, at } => {
            let offset = parse_offset(&at)?;
            let (mut session, info) = app.open(&media).await?;
            let id = chapter_at(&session, index)?;
            session.move_to(id, offset);
            app.save(&session, &info).await?;
        }

        Commands::Delete { media, indices } => {
            let (mut session, info) = app.open(&media).await?;
            // Resolve every number before deleting so positions don't shift
            let ids = indices
                .iter()
                .map(|index| chapter_at(&session, *index))
                .collect::<Result<Vec<_>>>()?;
            for id in ids {
                session.remove(id);
            }
            app.save(&session, &info).await?;
        }

        Commands::Apply { media, metadata } => {
            let text = tokio::fs::read_to_string(&metadata)
                .await
                .with_context(|| format!("Cannot read {}", metadata.display()))?;
            let parsed = parse_ffmetadata(&text)?;
            let (_, info) = app.open(&media).await?;

            let (mut session, mut events) = Session::new();
            events.on_chapters_parsed(parsed, info.duration);
            events.on_ready();
            session.pump();

            info!("📥 Applying {} chapters from {}", session.store().len(), metadata.display());
            app.save(&session, &info).await?;
        }

        Commands::Edit { media } => {
            app.edit(&media).await?;
        }
    }

    Ok(())
}

impl App {
    fn new(config: Config, dry_run: bool) -> Result<Self> {
        let ffprobe = locate_tool("ffprobe", config.tools.ffprobe_path.as_deref())
            .ok_or_else(|| anyhow!("ffprobe not found; install FFmpeg or set tools.ffprobe_path"))?;

        let writer = match locate_tool("ffmpeg", config.tools.ffmpeg_path.as_deref()) {
            Some(ffmpeg) => Some(
                ChapterWriter::new(ffmpeg)
                    .with_sidecar_suffix(config.editing.sidecar_suffix.clone())
                    .with_temp_infix(config.editing.temp_infix.clone()),
            ),
            None => {
                warn!("ffmpeg not found, saving is disabled");
                None
            }
        };

        Ok(Self {
            config,
            probe: MediaProbe::new(ffprobe),
            writer,
            dry_run,
        })
    }

    /// Load a media file into a fresh session
    async fn open(&self, media: &Path) -> Result<(Session, MediaInfo)> {
        self.load(&self.config.resolve_media_path(media)).await
    }

    /// Probe an already resolved path
    async fn load(&self, media: &Path) -> Result<(Session, MediaInfo)> {
        let info = self.probe.probe(media).await?;

        let (mut session, mut events) = Session::new();
        events.on_reset();
        events.on_chapters_parsed(info.chapters.clone(), info.duration);
        events.on_ready();
        session.pump();

        Ok((session, info))
    }

    async fn save(&self, session: &Session, info: &MediaInfo) -> Result<()> {
        let store = session.store();
        let document = store.to_ffmetadata();

        if self.dry_run {
            println!("{}", document);
            return Ok(());
        }

        let writer = self
            .writer
            .as_ref()
            .ok_or_else(|| anyhow!("ffmpeg not found; install FFmpeg or set tools.ffmpeg_path"))?;

        match writer.save(&info.path, &document, store.len()).await {
            Ok(outcome) => {
                println!("{}", outcome.user_message());
                Ok(())
            }
            Err(e) => {
                error!("{}", e);
                Err(anyhow!(e.user_message()))
            }
        }
    }

    /// Line-oriented editing session on stdin
    async fn edit(&self, media: &Path) -> Result<()> {
        let (mut session, mut info) = self.open(media).await?;
        print_chapters(&session, None);
        println!("Type 'help' for commands.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
            let rest = rest.trim();

            let result: Result<()> = match command {
                "quit" | "exit" | "q" => break,
                "help" | "?" => {
                    print_help();
                    Ok(())
                }
                "list" | "ls" => {
                    let position = if rest.is_empty() { Ok(None) } else { parse_offset(rest).map(Some) };
                    position.map_err(Into::into).map(|position| print_chapters(&session, position))
                }
                "add" => parse_offset(rest).map_err(Into::into).map(|offset| {
                    let id = session.add(offset);
                    describe(&session, id);
                }),
                "rename" => edit_indexed(&mut session, rest, |session, id, name| {
                    if let Some(next) = session.rename_and_advance(id, name) {
                        print!("next: ");
                        describe(session, next);
                    }
                    Ok(())
                }),
                "move" => edit_indexed(&mut session, rest, |session, id, at| {
                    session.move_to(id, parse_offset(at)?);
                    Ok(())
                }),
                "delete" | "rm" => parse_chapter_number(rest)
                    .and_then(|index| chapter_at(&session, index))
                    .map(|id| session.remove(id)),
                "next" => parse_chapter_number(rest)
                    .and_then(|index| chapter_at(&session, index))
                    .map(|id| match session.store().next(id) {
                    NextChapter::Found(next) => describe(&session, next.id()),
                    NextChapter::IsLast => println!("That is the last chapter"),
                    NextChapter::UnknownId => println!("No such chapter"),
                }),
                "save" => match self.save(&session, &info).await {
                    // The file changed on disk; reload what FFmpeg wrote
                    Ok(()) if !self.dry_run => {
                        let path = info.path.clone();
                        self.load(&path).await.map(|(reloaded, reloaded_info)| {
                            session = reloaded;
                            info = reloaded_info;
                        })
                    }
                    other => other,
                },
                _ => Err(anyhow!("Unknown command '{}', type 'help'", command)),
            };

            if let Err(e) = result {
                println!("{}", e);
            }
        }

        Ok(())
    }
}

/// Keep going with defaults when no config file could be loaded
fn config_or_default(loaded: Result<Config>) -> (Config, Option<anyhow::Error>) {
    match loaded {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    }
}

fn parse_chapter_number(input: &str) -> Result<usize> {
    input
        .trim()
        .parse()
        .with_context(|| format!("Invalid chapter number '{}'", input.trim()))
}

/// Resolve a one-based chapter number
fn chapter_at(session: &Session, index: usize) -> Result<ChapterId> {
    session
        .store()
        .get(index)
        .map(|chapter| chapter.id())
        .ok_or_else(|| anyhow!("No chapter #{} (there are {})", index, session.store().len()))
}

/// `<n> <argument>` commands of the interactive editor
fn edit_indexed<F>(session: &mut Session, rest: &str, apply: F) -> Result<()>
where
    F: FnOnce(&mut Session, ChapterId, &str) -> Result<()>,
{
    let (index, argument) = rest
        .split_once(' ')
        .ok_or_else(|| anyhow!("Expected a chapter number and a value"))?;
    let id = chapter_at(session, parse_chapter_number(index)?)?;
    apply(session, id, argument.trim())
}

fn describe(session: &Session, id: ChapterId) {
    let store = session.store();
    if let Some((position, chapter)) = store.iter().enumerate().find(|(_, chapter)| chapter.id() == id) {
        println!("#{} [{}] {}", position + 1, chapter.offset_formatted(), chapter.name);
    }
}

fn print_chapters(session: &Session, position: Option<u64>) {
    let store = session.store();
    let current = position.and_then(|position| store.current(position)).map(|chapter| chapter.id());

    println!("Duration: {}", format_offset(store.duration()));
    if store.is_empty() {
        println!("No chapters");
        return;
    }

    for (i, chapter) in store.iter().enumerate() {
        let marker = if Some(chapter.id()) == current { "●" } else { " " };
        println!("{} {:>3}. [{}] {}", marker, i + 1, chapter.offset_formatted(), chapter.name);
    }
}

fn print_help() {
    println!("  list [time]          show chapters, marking the one playing at [time]");
    println!("  add <time>           add a chapter");
    println!("  rename <n> <title>   rename chapter n and show the next one");
    println!("  move <n> <time>      move chapter n");
    println!("  delete <n>           delete chapter n");
    println!("  next <n>             show the chapter after n");
    println!("  save                 write chapters into the file");
    println!("  quit                 leave without saving");
}
