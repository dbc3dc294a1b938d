use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Subcommand, ValueEnum};

use spritegen_app::{render_svg, AppContext, HistoryPaginator, PageControls, SpritePreview, SubmitOutcome};
use spritegen_core::generation::{GenerationForm, ASPECT_RATIOS, DEFAULT_ASPECT_RATIO, DEFAULT_IMAGE_SIZE, IMAGE_SIZES};
use spritegen_core::images::download_filename;
use spritegen_core::pagination::PageItem;
use spritegen_core::types::{Generation, HistoryPage, Provider};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProviderArg {
    Gemini,
    Openrouter,
}

impl From<ProviderArg> for Provider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Gemini => Provider::Gemini,
            ProviderArg::Openrouter => Provider::OpenRouter,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate an image or a sprite sheet.
    Generate(GenerateArgs),
    /// List past generations.
    History(HistoryArgs),
    /// Show one generation.
    Show {
        id: String,
        /// Print the raw record as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete a generation.
    Delete { id: String },
    /// List available models grouped by provider.
    Models,
    /// Upload a reference image.
    Upload { path: PathBuf },
    /// Write the sprite-grid overlay of a sprite sheet as SVG.
    Overlay {
        id: String,
        /// Output file; defaults to `<output name>.grid.svg`.
        #[arg(long, short)]
        out: Option<PathBuf>,
        /// Also save the downloaded sheet next to the SVG.
        #[arg(long)]
        save_image: bool,
    },
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// What to draw.
    #[arg(long, short)]
    prompt: String,
    /// Model id from `spritegen models`.
    #[arg(long, short)]
    model: String,
    /// Provider, when the model is not in the catalog.
    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,
    #[arg(long, default_value = "")]
    negative_prompt: String,
    #[arg(long, default_value = DEFAULT_ASPECT_RATIO)]
    aspect_ratio: String,
    #[arg(long, default_value = DEFAULT_IMAGE_SIZE)]
    image_size: String,
    #[arg(long)]
    transparent: bool,
    /// Reference image to send along with the prompt.
    #[arg(long)]
    reference: Option<PathBuf>,
    /// Generate a sprite sheet instead of a single image.
    #[arg(long)]
    sprite_sheet: bool,
    #[arg(long, default_value_t = 4)]
    rows: u32,
    #[arg(long, default_value_t = 4)]
    cols: u32,
    #[arg(long, default_value_t = 16)]
    frames: u32,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long)]
    page_size: Option<u32>,
    #[arg(long)]
    search: Option<String>,
    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,
}

pub async fn run(ctx: &AppContext, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Generate(args) => generate(ctx, args).await,
        Command::History(args) => history(ctx, args).await,
        Command::Show { id, json } => show(ctx, &id, json).await,
        Command::Delete { id } => {
            ctx.history().delete(&id).await?;
            println!("Deleted {id}");
            Ok(())
        }
        Command::Models => models(ctx).await,
        Command::Upload { path } => upload(ctx, &path).await,
        Command::Overlay { id, out, save_image } => overlay(ctx, &id, out, save_image).await,
    }
}

async fn generate(ctx: &AppContext, args: GenerateArgs) -> anyhow::Result<()> {
    let mut form = prepare_form(&args)?;

    match ctx.models().find(&args.model).await {
        Ok(Some(model)) => form.select_model(&model),
        Ok(None) => tracing::warn!(model = %args.model, "Model not in catalog"),
        Err(err) => tracing::warn!(error = %err, "Could not load model catalog"),
    }
    if let Some(provider) = args.provider {
        form.provider = provider.into();
    }

    if let Some(path) = &args.reference {
        let bytes = read_file(path).await?;
        form.attach_reference_image(&bytes)?;
    }

    let orchestrator = ctx.orchestrator();
    match orchestrator.submit(&form).await? {
        SubmitOutcome::Published(generation) => {
            print_generation(ctx, &generation);
            Ok(())
        }
        SubmitOutcome::Busy => bail!("a generation is already in progress"),
    }
}

/// Build the form from the arguments and run the local checks, before
/// anything is sent.
fn prepare_form(args: &GenerateArgs) -> anyhow::Result<GenerationForm> {
    if !ASPECT_RATIOS.contains(&args.aspect_ratio.as_str()) {
        tracing::warn!(aspect_ratio = %args.aspect_ratio, "Unknown aspect ratio; sending anyway");
    }
    if !IMAGE_SIZES.contains(&args.image_size.as_str()) {
        tracing::warn!(image_size = %args.image_size, "Unknown image size; sending anyway");
    }

    let mut form = GenerationForm::new(args.prompt.clone());
    form.negative_prompt = args.negative_prompt.clone();
    form.aspect_ratio = args.aspect_ratio.clone();
    form.image_size = args.image_size.clone();
    form.transparent_bg = args.transparent;
    form.is_sprite_sheet = args.sprite_sheet;
    form.set_sprite_layout(args.rows, args.cols, args.frames);
    form.model = Some(args.model.clone());
    form.validate_submission()?;
    Ok(form)
}

async fn history(ctx: &AppContext, args: HistoryArgs) -> anyhow::Result<()> {
    let mut history = match args.page_size {
        Some(size) => HistoryPaginator::new(
            Arc::clone(&ctx.gateway),
            ctx.cache.clone(),
            size.max(1),
            ctx.config.history_stale_time(),
        ),
        None => ctx.history(),
    };
    history.set_search(args.search.as_deref());
    history.set_provider(args.provider.map(Into::into));
    history.set_page(args.page);

    let page = history.load().await?;
    print_history(&page, &history.controls(&page));
    Ok(())
}

async fn show(ctx: &AppContext, id: &str, json: bool) -> anyhow::Result<()> {
    let generation = ctx.history().detail(id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(generation.as_ref())?);
    } else {
        print_generation(ctx, &generation);
    }
    Ok(())
}

async fn models(ctx: &AppContext) -> anyhow::Result<()> {
    let catalog = ctx.models().models().await?;
    if catalog.is_empty() {
        println!("No models available.");
        return Ok(());
    }
    for (provider, models) in catalog.grouped_by_provider() {
        println!("{provider}");
        for model in models {
            println!("  {:<40} {}", model.id, model.name);
        }
    }
    Ok(())
}

async fn upload(ctx: &AppContext, path: &Path) -> anyhow::Result<()> {
    let bytes = read_file(path).await?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("reference.png")
        .to_string();
    let uploaded = ctx.orchestrator().upload_reference(bytes, &filename).await?;
    println!("Uploaded {} -> {}", uploaded.filename, uploaded.path);
    Ok(())
}

async fn overlay(
    ctx: &AppContext,
    id: &str,
    out: Option<PathBuf>,
    save_image: bool,
) -> anyhow::Result<()> {
    let generation = ctx.history().detail(id).await?;
    if !generation.is_viewable() {
        bail!("{id} has no finished output (status: {})", generation.status);
    }
    if generation.overlay_layout().is_none() {
        bail!("{id} is not a sprite sheet");
    }

    let mut preview = SpritePreview::new();
    let bytes = preview.load_output(ctx.gateway.as_ref(), &generation).await?;
    let Some(grid) = preview.overlay() else {
        bail!("could not compute an overlay for {id}");
    };

    let image_name = download_filename(generation.output_image_path.as_deref());
    let out = out.unwrap_or_else(|| PathBuf::from(format!("{image_name}.grid.svg")));
    let href = if save_image {
        let image_path = out.with_file_name(&image_name);
        tokio::fs::write(&image_path, &bytes)
            .await
            .with_context(|| format!("writing {}", image_path.display()))?;
        Some(image_name.clone())
    } else {
        generation
            .output_image_path
            .as_deref()
            .and_then(|r| ctx.gateway.image_url(r))
    };

    let svg = render_svg(grid, href.as_deref());
    tokio::fs::write(&out, svg)
        .await
        .with_context(|| format!("writing {}", out.display()))?;
    tracing::info!(
        generation_id = %id,
        labels = grid.labels.len(),
        path = %out.display(),
        "Overlay written"
    );
    println!("Wrote {}", out.display());
    Ok(())
}

async fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

// ---- output ----

fn print_generation(ctx: &AppContext, generation: &Generation) {
    println!("{}  [{}]", generation.id, generation.status);
    println!("  Model:   {} ({})", generation.model, generation.provider);
    println!("  Prompt:  {}", generation.prompt);
    if let Some(layout) = generation.overlay_layout() {
        println!(
            "  Layout:  {}x{} ({} frames)",
            layout.rows, layout.cols, layout.frame_count
        );
    }
    if let Some(url) = generation
        .output_image_path
        .as_deref()
        .and_then(|r| ctx.gateway.image_url(r))
    {
        println!("  Image:   {url}");
    }
    if let Some(url) = generation
        .thumbnail_path
        .as_deref()
        .and_then(|r| ctx.gateway.image_url(r))
    {
        println!("  Thumb:   {url}");
    }
    if let Some(err) = &generation.error_message {
        println!("  Error:   {err}");
    }
}

fn print_history(page: &HistoryPage, controls: &PageControls) {
    if page.is_empty() {
        println!("No generations found.");
    }
    for generation in &page.items {
        let kind = if generation.is_sprite_sheet { "sheet" } else { "image" };
        println!(
            "{}  {:<10} {:<6} {}  {}",
            generation.created_at.format("%Y-%m-%d %H:%M"),
            generation.status.as_str(),
            kind,
            generation.id,
            generation.prompt
        );
    }
    if controls.visible {
        let window: Vec<String> = controls
            .window
            .iter()
            .map(|item| match item {
                PageItem::Page(p) if *p == page.page => format!("[{p}]"),
                PageItem::Page(p) => p.to_string(),
                PageItem::Ellipsis => "...".to_string(),
            })
            .collect();
        println!(
            "{} {} {}   ({} total)",
            if controls.has_prev { "<" } else { " " },
            window.join(" "),
            if controls.has_next { ">" } else { " " },
            page.total_count
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Command,
    }

    fn generate_args(argv: &[&str]) -> GenerateArgs {
        let argv = ["spritegen", "generate"].iter().chain(argv).copied();
        match TestCli::parse_from(argv).command {
            Command::Generate(args) => args,
            other => panic!("expected generate, got {other:?}"),
        }
    }

    #[test]
    fn blank_prompt_is_refused_before_any_request() {
        let args = generate_args(&["--prompt", "  ", "--model", "gemini-2.5-flash-image"]);
        let err = prepare_form(&args).unwrap_err();
        assert!(err.to_string().contains("Prompt must not be empty"), "{err}");
    }

    #[test]
    fn sprite_arguments_land_on_the_form() {
        let args = generate_args(&[
            "--prompt", "walk cycle", "--model", "gemini-2.5-flash-image",
            "--sprite-sheet", "--rows", "2", "--cols", "64", "--frames", "6",
        ]);
        let form = prepare_form(&args).unwrap();
        assert!(form.is_sprite_sheet);
        assert_eq!(form.sprite_layout.rows, 2);
        assert_eq!(form.sprite_layout.cols, 32);
        assert_eq!(form.model.as_deref(), Some("gemini-2.5-flash-image"));
    }
}
