use rust_fontresolve::scan::{font_directories, DirectoryBackend};
use rust_fontresolve::{FontRequest, FontResolver, FontSize, Script, WritingSystem};
use std::time::Instant;

fn main() {
    env_logger::init();

    let dirs = match font_directories() {
        Ok(dirs) => dirs,
        Err(e) => {
            eprintln!("no font directories: {}", e);
            return;
        }
    };
    println!("Scanning {} directories...", dirs.len());
    for dir in &dirs {
        println!("  {}", dir.display());
    }

    let start = Instant::now();
    let resolver = FontResolver::new(Box::new(DirectoryBackend::new(dirs)));
    let families = resolver.families(None);
    println!("✓ {} families in {:?}\n", families.len(), start.elapsed());

    for family in families.iter().take(10) {
        println!("  {}: {}", family, resolver.styles(family).join(", "));
    }
    if families.len() > 10 {
        println!("  ... and {} more", families.len() - 10);
    }

    println!(
        "\n{} families support Japanese",
        resolver.families(Some(WritingSystem::Japanese)).len()
    );

    let families = std::env::args().skip(1).collect::<Vec<_>>().join(",");
    let families = if families.is_empty() {
        "sans-serif".to_string()
    } else {
        families
    };

    let request = FontRequest {
        families: FontRequest::parse_families(&families),
        size: FontSize::Point(12.0),
        script: Script::Latin,
        ..Default::default()
    };

    let start = Instant::now();
    let engine = resolver.load(&request);
    println!(
        "\n'{}' -> '{}' ({:?}, {} bytes) in {:?}",
        families,
        engine.engine().family_name(),
        engine.engine().kind(),
        engine.engine().cache_cost(),
        start.elapsed()
    );
}
