use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use volume_mpr::{
    DicomSource, HeadlessRayCaster, HeadlessSurface, InputEvent, NiftiSource, Orientation,
    RenderSurface, ScrollDirection, SortBy, Viewer, VolumeSource, load_config, source_for_path,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Dicom,
    Nifti,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum SliceOrder {
    #[default]
    Position,
    Table,
    Instance,
    None,
}

impl From<SliceOrder> for SortBy {
    fn from(order: SliceOrder) -> Self {
        match order {
            SliceOrder::Position => SortBy::ImagePositionPatient,
            SliceOrder::Table => SortBy::TablePosition,
            SliceOrder::Instance => SortBy::InstanceNumber,
            SliceOrder::None => SortBy::None,
        }
    }
}

/// Render the MPR slices of a CT volume and its mask to PNG files.
#[derive(Debug, Parser)]
#[command(name = "volume-mpr", version)]
struct Args {
    /// CT volume: DICOM directory or NIfTI file
    #[arg(long)]
    base: PathBuf,

    /// Segmentation mask for the CT volume
    #[arg(long)]
    label: Option<PathBuf>,

    /// Input format; guessed from each path when omitted
    #[arg(long, value_enum)]
    format: Option<Format>,

    /// Slice order of DICOM series
    #[arg(long, value_enum, default_value_t)]
    sort_by: SliceOrder,

    /// Liver opacity in [0, 1]
    #[arg(long)]
    liver_opacity: Option<f64>,

    /// Scroll notches applied to the axial view, negative scrolls back
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    scroll: i64,

    /// Output directory for the textures
    #[arg(long, default_value = "mpr-out")]
    out: PathBuf,

    /// YAML viewer settings
    #[arg(long)]
    config: Option<PathBuf>,
}

fn source(format: Option<Format>, sort_by: SortBy, path: &Path) -> Result<Box<dyn VolumeSource>> {
    Ok(match format {
        Some(Format::Dicom) => Box::new(DicomSource { sort_by }),
        Some(Format::Nifti) => Box::new(NiftiSource),
        None if path.is_dir() => Box::new(DicomSource { sort_by }),
        None => source_for_path(path)?,
    })
}

fn main() -> Result<()> {
    volume_mpr::init_logging()?;
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path).with_context(|| format!("reading {}", path.display()))?,
        None => Default::default(),
    };
    let mut viewer = Viewer::new(
        HeadlessSurface::new(1024, 1024),
        HeadlessRayCaster::new(),
        config,
    );

    let sort_by = SortBy::from(args.sort_by);
    let base_source = source(args.format, sort_by, &args.base)?;
    viewer
        .load_base(base_source.as_ref(), &args.base)
        .with_context(|| format!("loading {}", args.base.display()))?;
    if let Some(label) = &args.label {
        let label_source = source(args.format, sort_by, label)?;
        viewer
            .load_label(label_source.as_ref(), label)
            .with_context(|| format!("loading {}", label.display()))?;
    }
    if let Some(opacity) = args.liver_opacity {
        viewer.set_liver_opacity(opacity);
    }
    viewer.enter_mpr()?;

    if args.scroll != 0 {
        scroll_axial(&mut viewer, args.scroll);
    }

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;
    let session = viewer.mpr_session().context("MPR session missing")?;
    for orientation in Orientation::ALL {
        let name = orientation.name().to_ascii_lowercase();
        if let Some(texture) = session.base_texture(orientation) {
            let path = args.out.join(format!("{name}-base.png"));
            texture.save(&path).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "wrote base slice");
        }
        if let Some(texture) = session.label_texture(orientation) {
            let path = args.out.join(format!("{name}-label.png"));
            texture.save(&path).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "wrote label slice");
        }
    }
    Ok(())
}

/// Sends scroll events to the centre of the axial view.
fn scroll_axial(viewer: &mut Viewer<HeadlessSurface, HeadlessRayCaster>, notches: i64) {
    let Some(viewport) = viewer
        .mpr_session()
        .and_then(|session| session.viewport_for(Orientation::Axial))
    else {
        return;
    };
    let (width, height) = viewer.surface().size();
    let Some(rect) = viewer.surface().viewport(viewport).map(|vp| vp.rect) else {
        return;
    };
    let position = (
        (rect.xmin + rect.xmax) * 0.5 * f64::from(width),
        (rect.ymin + rect.ymax) * 0.5 * f64::from(height),
    );
    let direction = if notches > 0 {
        ScrollDirection::Forward
    } else {
        ScrollDirection::Backward
    };
    for _ in 0..notches.unsigned_abs() {
        viewer.handle_event(InputEvent::Scroll {
            position,
            direction,
            modifier: false,
        });
    }
    info!(
        index = ?viewer.slice_index(Orientation::Axial),
        "axial slice after scrolling"
    );
}
