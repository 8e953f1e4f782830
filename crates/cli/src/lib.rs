use anyhow::{Context, Result};
use assist::{AssistOutcome, ChatSession, HttpAssistant, RewriteInstruction};
use clap::{Parser, Subcommand};
use doc_model::{Click, EditTarget, LayoutLine, OverlayElement, Viewport};
use pdf_engine::{default_engine, DocumentHandle, LopdfEngine, OpenSource, PdfEngine, RenderRequest};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::{Settings, Storage};
use tracing::debug;
use viewer_core::{EditorSession, ExportMode, ExportOutcome, LoadOutcome};

#[derive(Debug, Parser)]
#[command(name = "inkreflow")]
#[command(about = "Reading-order text, overlay editing and reflow export for PDF pages")]
pub struct Cli {
    /// Settings file to use instead of the one in the local data directory.
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the reading-order text of every page.
    Text {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Print the joined document text instead of JSON.
        #[arg(long)]
        plain: bool,
    },
    /// Print the overlay elements of one page.
    Overlay {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
        /// Click the run under this viewport point, as `X,Y` in pixels.
        #[arg(long, value_parser = parse_point)]
        at: Option<(f32, f32)>,
    },
    /// Render a page surface to PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the reflowed output lines.
    Layout {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Start every source page on a new output page.
        #[arg(long)]
        per_page: bool,
    },
    /// Replace run contents and print the resulting text.
    Edit {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// `PAGE:RUN=TEXT`, may be repeated.
        #[arg(long = "set", value_parser = parse_edit, required = true)]
        edits: Vec<(EditTarget, String)>,
        /// Also export the edited document.
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        per_page: bool,
    },
    /// Reflow the document text into a new PDF.
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        per_page: bool,
    },
    /// Rewrite one run with the assistant.
    Rewrite {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        run: usize,
        #[arg(long, value_parser = parse_instruction)]
        instruction: RewriteInstruction,
    },
    /// Ask the assistant a question about the document.
    Chat {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        message: String,
    },
    /// Print the effective settings.
    Settings {
        /// Write the effective settings back to the settings file.
        #[arg(long)]
        init: bool,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct PageTextOutput {
    error: Option<String>,
    page: u32,
    text: String,
}

#[derive(Debug, Serialize)]
struct TextOutput {
    full_text: String,
    page_count: u32,
    pages: Vec<PageTextOutput>,
}

#[derive(Debug, Serialize)]
struct OverlayOutput {
    page: u32,
    viewport: Viewport,
    error: Option<String>,
    elements: Vec<OverlayElement>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ExportOutput {
    Written { path: String, pages: u32, lines: usize },
    NothingToExport,
}

impl From<ExportOutcome> for ExportOutput {
    fn from(outcome: ExportOutcome) -> Self {
        match outcome {
            ExportOutcome::Written { path, pages, lines } => {
                Self::Written { path: path.display().to_string(), pages, lines }
            }
            ExportOutcome::NothingToExport => Self::NothingToExport,
        }
    }
}

#[derive(Debug, Serialize)]
struct EditOutput {
    text: TextOutput,
    export: Option<ExportOutput>,
}

#[derive(Debug, Serialize)]
struct RewriteOutput {
    outcome: AssistOutcome,
    page_text: String,
}

#[derive(Debug, Serialize)]
struct SettingsOutput {
    path: String,
    settings: Settings,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let settings_file = cli.settings.as_deref();

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Text { file, plain } => run_text(&file, settings_file, plain),
        Commands::Overlay { file, page, scale, at } => {
            run_overlay(&file, settings_file, page, scale, at)
        }
        Commands::Render { file, page, scale, output } => {
            run_render(&file, page, scale, output.as_deref())
        }
        Commands::Layout { file, per_page } => run_layout(&file, settings_file, per_page),
        Commands::Edit { file, edits, output, per_page } => {
            run_edit(&file, settings_file, edits, output.as_deref(), per_page)
        }
        Commands::Export { file, output, per_page } => {
            run_export(&file, settings_file, &output, per_page)
        }
        Commands::Rewrite { file, page, run, instruction } => {
            run_rewrite(&file, settings_file, EditTarget::new(page, run), instruction)
        }
        Commands::Chat { file, message } => run_chat(&file, settings_file, &message),
        Commands::Settings { init } => run_settings(settings_file, init),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn storage_for(settings_file: Option<&Path>) -> Result<Storage> {
    match settings_file {
        Some(path) => Ok(Storage::with_file(path)),
        None => Storage::from_default_project().context("failed to locate settings directory"),
    }
}

fn load_settings(settings_file: Option<&Path>) -> Result<Settings> {
    let storage = storage_for(settings_file)?;
    let settings = storage
        .load_settings()
        .with_context(|| format!("failed to read settings from {}", storage.settings_path().display()))?;

    debug!(path = %storage.settings_path().display(), "loaded settings");
    Ok(settings)
}

struct OpenDocument {
    engine: LopdfEngine,
    handle: DocumentHandle,
    session: EditorSession,
}

fn open_document(file: &Path, settings: &Settings, scale: f32) -> Result<OpenDocument> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;
    let mut session =
        EditorSession::for_document(&engine, handle, settings.reading_order, settings.reflow)?;
    session.load_all(&engine, handle, scale).context("failed to load pages")?;

    Ok(OpenDocument { engine, handle, session })
}

fn text_output(session: &EditorSession) -> TextOutput {
    let text = session.document_text();
    let pages = (1..=session.page_count())
        .map(|page| PageTextOutput {
            error: session.page(page).and_then(|loaded| loaded.error()).map(str::to_owned),
            page,
            text: text.page(page).unwrap_or_default().to_owned(),
        })
        .collect();

    TextOutput { full_text: text.full_text(), page_count: session.page_count(), pages }
}

fn export_mode(per_page: bool) -> ExportMode {
    if per_page {
        ExportMode::PerSourcePage
    } else {
        ExportMode::Continuous
    }
}

fn print_json<T: Serialize>(payload: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(payload)?;
    println!("{json}");
    Ok(())
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let first_page_size_pt = if page_count > 0 {
        let size = engine.page_size(handle, 0)?;
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    print_json(&InfoOutput { path: file.display().to_string(), page_count, first_page_size_pt })?;

    engine.close(handle)?;

    Ok(())
}

fn run_text(file: &Path, settings_file: Option<&Path>, plain: bool) -> Result<()> {
    let settings = load_settings(settings_file)?;
    let doc = open_document(file, &settings, 1.0)?;

    if plain {
        println!("{}", doc.session.document_text().full_text());
        return Ok(());
    }

    print_json(&text_output(&doc.session))
}

fn run_overlay(
    file: &Path,
    settings_file: Option<&Path>,
    page: u32,
    scale: f32,
    at: Option<(f32, f32)>,
) -> Result<()> {
    let settings = load_settings(settings_file)?;
    let mut doc = open_document(file, &settings, 1.0)?;

    let outcome = doc.session.load_page(&doc.engine, doc.handle, page, scale)?;
    if outcome == LoadOutcome::Stale {
        anyhow::bail!("page {page} load was superseded");
    }

    if let Some((x, y)) = at {
        if doc.session.click_at(page, x, y, Click::default())?.is_none() {
            anyhow::bail!("no text run at {x},{y} on page {page}");
        }
    }

    let loaded = doc.session.page(page).context("page was not loaded")?;
    print_json(&OverlayOutput {
        page,
        viewport: loaded.viewport,
        error: loaded.error().map(str::to_owned),
        elements: doc.session.overlay(page)?,
    })
}

fn run_render(file: &Path, page: u32, scale: f32, output: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let image = engine
        .render_page(handle, RenderRequest { page_index: page - 1, scale })
        .context("failed to render page")?;

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file, page));

    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    engine.close(handle)?;

    Ok(())
}

fn run_layout(file: &Path, settings_file: Option<&Path>, per_page: bool) -> Result<()> {
    let settings = load_settings(settings_file)?;
    let doc = open_document(file, &settings, 1.0)?;

    let lines: Vec<LayoutLine> = doc.session.layout(export_mode(per_page));
    print_json(&lines)
}

fn run_edit(
    file: &Path,
    settings_file: Option<&Path>,
    edits: Vec<(EditTarget, String)>,
    output: Option<&Path>,
    per_page: bool,
) -> Result<()> {
    let settings = load_settings(settings_file)?;
    let mut doc = open_document(file, &settings, 1.0)?;

    for (target, text) in edits {
        doc.session
            .click(target, Click::default())
            .with_context(|| format!("cannot edit run {} on page {}", target.run, target.page))?;
        doc.session.update_draft(text);
    }
    doc.session.blur()?;

    let export = match output {
        Some(path) => Some(doc.session.export(path, export_mode(per_page))?.into()),
        None => None,
    };

    print_json(&EditOutput { text: text_output(&doc.session), export })
}

fn run_export(
    file: &Path,
    settings_file: Option<&Path>,
    output: &Path,
    per_page: bool,
) -> Result<()> {
    let settings = load_settings(settings_file)?;
    let doc = open_document(file, &settings, 1.0)?;

    let outcome = doc.session.export(output, export_mode(per_page)).context("failed to export")?;
    print_json(&ExportOutput::from(outcome))
}

fn run_rewrite(
    file: &Path,
    settings_file: Option<&Path>,
    target: EditTarget,
    instruction: RewriteInstruction,
) -> Result<()> {
    let settings = load_settings(settings_file)?;
    let mut doc = open_document(file, &settings, 1.0)?;
    let assistant = HttpAssistant::from_settings(&settings.assistant);

    doc.session
        .click(target, Click::default())
        .with_context(|| format!("cannot edit run {} on page {}", target.run, target.page))?;
    let outcome = doc.session.rewrite_active(&assistant, instruction)?;
    doc.session.blur()?;

    let page_text = doc.session.document_text().page(target.page).unwrap_or_default().to_owned();
    print_json(&RewriteOutput { outcome, page_text })
}

fn run_chat(file: &Path, settings_file: Option<&Path>, message: &str) -> Result<()> {
    let settings = load_settings(settings_file)?;
    let doc = open_document(file, &settings, 1.0)?;
    let assistant = HttpAssistant::from_settings(&settings.assistant);

    let mut chat = ChatSession::new(settings.assistant.max_context_chars);
    print_json(&doc.session.ask(&mut chat, &assistant, message))
}

fn run_settings(settings_file: Option<&Path>, init: bool) -> Result<()> {
    let storage = storage_for(settings_file)?;
    let settings = storage.load_settings().context("failed to read settings")?;

    if init {
        storage.save_settings(&settings).context("failed to write settings")?;
    }

    print_json(&SettingsOutput { path: storage.settings_path().display().to_string(), settings })
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}

fn parse_point(value: &str) -> Result<(f32, f32), String> {
    let (x, y) = value.split_once(',').ok_or_else(|| format!("expected X,Y, got `{value}`"))?;
    let x = x.trim().parse::<f32>().map_err(|err| format!("invalid X: {err}"))?;
    let y = y.trim().parse::<f32>().map_err(|err| format!("invalid Y: {err}"))?;
    Ok((x, y))
}

fn parse_edit(value: &str) -> Result<(EditTarget, String), String> {
    let (location, text) =
        value.split_once('=').ok_or_else(|| format!("expected PAGE:RUN=TEXT, got `{value}`"))?;
    let (page, run) =
        location.split_once(':').ok_or_else(|| format!("expected PAGE:RUN, got `{location}`"))?;
    let page = page.trim().parse::<u32>().map_err(|err| format!("invalid page: {err}"))?;
    let run = run.trim().parse::<usize>().map_err(|err| format!("invalid run: {err}"))?;
    Ok((EditTarget::new(page, run), text.to_owned()))
}

fn parse_instruction(value: &str) -> Result<RewriteInstruction, String> {
    RewriteInstruction::from_key(value).ok_or_else(|| {
        let keys: Vec<&str> = RewriteInstruction::ALL.iter().map(|i| i.key()).collect();
        format!("unknown instruction `{value}`, expected one of: {}", keys.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_argument_splits_on_first_equals() {
        let (target, text) = parse_edit("2:3=a=b").expect("edit should parse");
        assert_eq!(target, EditTarget::new(2, 3));
        assert_eq!(text, "a=b");

        assert!(parse_edit("2=text").is_err());
        assert!(parse_edit("x:1=text").is_err());
    }

    #[test]
    fn point_argument_accepts_spaces() {
        assert_eq!(parse_point("10.5, 20"), Ok((10.5, 20.0)));
        assert!(parse_point("10").is_err());
    }

    #[test]
    fn instruction_argument_lists_known_keys_on_error() {
        assert_eq!(parse_instruction("shorten"), Ok(RewriteInstruction::Shorten));
        let err = parse_instruction("poem").expect_err("unknown key");
        assert!(err.contains("fix-grammar"));
    }
}
