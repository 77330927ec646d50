use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use coverkit::{
    FadeConfig, FadeScheduler, PixelCanvas, PixelFormat, RatingIconCache, ScalePolicy,
    decode_from_bytes, decode_scaled,
};

#[derive(Parser, Debug)]
#[command(name = "coverkit", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a cover image and fit it to a target size.
    Scale(ScaleArgs),
    /// Compose a rating strip from active/inactive glyph images.
    Rating(RatingArgs),
    /// Cross-fade between two covers, writing every intermediate frame.
    Crossfade(CrossfadeArgs),
}

#[derive(Parser, Debug)]
struct ScaleArgs {
    /// Input cover image.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Target width.
    #[arg(long)]
    width: u32,

    /// Target height.
    #[arg(long)]
    height: u32,

    /// Force exact target dimensions instead of fitting inside them.
    #[arg(long)]
    no_keep_ratio: bool,

    /// Allow growing past the native size.
    #[arg(long)]
    upscale: bool,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RatingArgs {
    /// Active (filled) glyph image.
    #[arg(long)]
    active: PathBuf,

    /// Inactive (empty) glyph image.
    #[arg(long)]
    inactive: PathBuf,

    /// Maximum rating value (number of glyphs per strip).
    #[arg(long, default_value_t = 5)]
    maximum: u32,

    /// Rating to render; clamped to [0, maximum].
    #[arg(long)]
    rating: i32,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct CrossfadeArgs {
    /// Starting cover image.
    #[arg(long)]
    from: PathBuf,

    /// Cover image to fade to.
    #[arg(long)]
    to: PathBuf,

    /// Number of blend steps.
    #[arg(long, default_value_t = 10)]
    steps: u32,

    /// Directory for the numbered frame PNGs.
    #[arg(long)]
    out_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Scale(args) => cmd_scale(args),
        Command::Rating(args) => cmd_rating(args),
        Command::Crossfade(args) => cmd_crossfade(args),
    }
}

fn read_canvas(path: &Path) -> anyhow::Result<PixelCanvas> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
    let canvas =
        decode_from_bytes(&bytes).with_context(|| format!("decode '{}'", path.display()))?;
    Ok(canvas)
}

fn write_png(canvas: &PixelCanvas, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    let color = match canvas.format() {
        PixelFormat::Rgb8 => image::ColorType::Rgb8,
        PixelFormat::Rgba8 => image::ColorType::Rgba8,
    };
    image::save_buffer_with_format(
        path,
        canvas.bytes(),
        canvas.width(),
        canvas.height(),
        color,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))?;
    Ok(())
}

fn cmd_scale(args: ScaleArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read image '{}'", args.in_path.display()))?;

    let policy = ScalePolicy {
        target: (args.width, args.height),
        keep_ratio: !args.no_keep_ratio,
        upscale: args.upscale,
    };
    let canvas = decode_scaled(&bytes, &policy)
        .with_context(|| format!("decode '{}'", args.in_path.display()))?;

    write_png(&canvas, &args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_rating(args: RatingArgs) -> anyhow::Result<()> {
    let active = read_canvas(&args.active)?;
    let inactive = read_canvas(&args.inactive)?;

    let cache = RatingIconCache::build(active, inactive, args.maximum)
        .context("build rating strips")?;
    write_png(cache.get(args.rating), &args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_crossfade(args: CrossfadeArgs) -> anyhow::Result<()> {
    let from = read_canvas(&args.from)?;
    let to = read_canvas(&args.to)?;

    let mut scheduler = FadeScheduler::new(FadeConfig {
        fading: true,
        ..FadeConfig::default()
    });

    // Settle the starting cover so the cross-fade has an opaque base.
    if let Some(req) = scheduler.request_show(from) {
        while scheduler.tick(req.token) == coverkit::Tick::Continue {}
    }

    let req = scheduler
        .request_cross_fade(to, args.steps)?
        .context("cross-fade did not start (bug)")?;

    let mut step = 0u32;
    loop {
        let done = scheduler.tick(req.token) == coverkit::Tick::Stop;
        step += 1;

        let frame = scheduler.frame().context("cross-fade dropped its frame")?;
        let path = args.out_dir.join(format!("frame_{step:04}.png"));
        write_png(frame, &path)?;

        if done {
            break;
        }
    }

    eprintln!("wrote {} frames to {}", step, args.out_dir.display());
    Ok(())
}
