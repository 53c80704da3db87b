//! Command-line inspector for SMD model files.
//!
//! Loads a model on the headless device and prints its version, clips,
//! mesh hierarchy and bounds. With `--frame` the model is posed and the
//! world matrix of every mesh is printed as well.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use delta_graphics::config::{Config, GraphicsConfig};
use delta_graphics::foundation::logging;
use delta_graphics::render::{Graphics, Mesh, Model, ParentRef};
use delta_graphics::scene::AABB;

fn command() -> Command {
    Command::new("smd_inspect")
        .about("Prints the structure and pose of an SMD model")
        .arg(
            Arg::new("model")
                .value_name("FILE")
                .help("SMD file to inspect")
                .required(true),
        )
        .arg(
            Arg::new("skeleton")
                .short('s')
                .long("skeleton")
                .value_name("FILE")
                .help("Skeleton model the meshes are skinned to"),
        )
        .arg(
            Arg::new("frame")
                .short('f')
                .long("frame")
                .value_name("FRAME")
                .help("Pose the model at this frame and print world matrices")
                .value_parser(clap::value_parser!(i32)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Graphics configuration (.toml or .ron)"),
        )
        .arg(
            Arg::new("software-skinning")
                .long("software-skinning")
                .help("Skin vertices on the CPU instead of through the bone texture")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log loader diagnostics")
                .action(ArgAction::SetTrue),
        )
}

fn format_box(bounds: &AABB) -> String {
    if !bounds.is_valid() {
        return "empty".to_string();
    }
    format!(
        "({:.2}, {:.2}, {:.2}) .. ({:.2}, {:.2}, {:.2})",
        bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z
    )
}

fn depth(model: &Model, mesh: &Mesh) -> usize {
    let mut depth = 0;
    let mut parent = mesh.parent();
    while let Some(ParentRef::Local(id)) = parent {
        depth += 1;
        if depth > model.meshes().len() {
            break;
        }
        parent = model.mesh_by_id(id).and_then(Mesh::parent);
    }
    depth
}

fn print_summary(model: &Model) {
    println!("Model:      {}", model.name());
    println!("Version:    {:?}", model.version());
    println!("Meshes:     {}", model.meshes().len());
    println!("Max frame:  {}", model.max_frame());
    println!("Bounds:     {}", format_box(model.world_box()));
    println!(
        "Sphere:     center ({:.2}, {:.2}, {:.2}) radius {:.2}",
        model.bounding_sphere().center.x,
        model.bounding_sphere().center.y,
        model.bounding_sphere().center.z,
        model.bounding_sphere().radius
    );
    if let Some(materials) = model.materials() {
        println!("Materials:  {}", materials.len());
    }

    for (index, clip) in model.clips().iter().enumerate() {
        println!(
            "Clip {index}:     frames {}..{} keys {}+{}",
            clip.start_frame, clip.end_frame, clip.key_frame_start_index, clip.key_frame_count
        );
    }
}

fn print_hierarchy(model: &Model) {
    println!();
    println!("Hierarchy:");
    for &id in model.ordered_meshes() {
        let Some(mesh) = model.mesh_by_id(id) else {
            continue;
        };
        let indent = "  ".repeat(depth(model, mesh) + 1);
        let skinned = if mesh.is_skinned() { " skinned" } else { "" };
        println!(
            "{indent}[{}] {} ({} vertices, keys r{} p{} s{}{skinned}) {}",
            id.0,
            mesh.name(),
            mesh.vertex_count(),
            mesh.rotation_keys().len(),
            mesh.position_keys().len(),
            mesh.scale_keys().len(),
            format_box(mesh.world_box())
        );
    }
}

fn print_pose(model: &Model, frame: i32) {
    println!();
    println!("World matrices at frame {frame}:");
    for (index, mesh) in model.meshes().iter().enumerate() {
        println!("  [{index}] {}", mesh.name());
        let world = mesh.world();
        for row in 0..4 {
            println!(
                "      {:>9.3} {:>9.3} {:>9.3} {:>9.3}",
                world[(row, 0)],
                world[(row, 1)],
                world[(row, 2)],
                world[(row, 3)]
            );
        }
    }
}

fn main() -> Result<()> {
    let matches = command().get_matches();

    if matches.get_flag("verbose") {
        logging::init_with_filter("delta_graphics=debug");
    } else {
        logging::init_with_filter("warn");
    }

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => GraphicsConfig::load_from_file(path).with_context(|| format!("Failed to read {path}"))?,
        None => GraphicsConfig::default(),
    };
    if matches.get_flag("software-skinning") {
        config.use_software_skinning = true;
    }

    let mut gfx = Graphics::headless(config);

    let skeleton = match matches.get_one::<String>("skeleton") {
        Some(path) => {
            let skeleton = Model::load(path, None, false, &mut gfx)
                .with_context(|| format!("Failed to load skeleton {path}"))?;
            Some(Rc::new(RefCell::new(skeleton)))
        }
        None => None,
    };

    let path = PathBuf::from(matches.get_one::<String>("model").context("Missing model path")?);
    let mut model = Model::load(&path, skeleton.as_ref(), false, &mut gfx)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    if let Some(&frame) = matches.get_one::<i32>("frame") {
        model.set_frame(frame, None, &mut gfx);
        print_summary(&model);
        print_hierarchy(&model);
        print_pose(&model, frame);
    } else {
        model.update_bounding_volumes(true);
        print_summary(&model);
        print_hierarchy(&model);
    }

    log::debug!("Inspected {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_graphics::foundation::math::Vec3;

    #[test]
    fn arguments_parse() {
        let matches = command()
            .try_get_matches_from(["smd_inspect", "tower.smd", "--frame", "12", "--software-skinning"])
            .unwrap();
        assert_eq!(matches.get_one::<String>("model").map(String::as_str), Some("tower.smd"));
        assert_eq!(matches.get_one::<i32>("frame"), Some(&12));
        assert!(matches.get_flag("software-skinning"));
        assert!(!matches.get_flag("verbose"));
    }

    #[test]
    fn model_path_is_required() {
        assert!(command().try_get_matches_from(["smd_inspect"]).is_err());
    }

    #[test]
    fn empty_boxes_print_as_empty() {
        assert_eq!(format_box(&AABB::empty()), "empty");
        let bounds = AABB::new(Vec3::zeros(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(format_box(&bounds), "(0.00, 0.00, 0.00) .. (1.00, 2.00, 3.00)");
    }
}
