use rust_fontresolve::{
    weight, FontDescription, FontRequest, FontResolver, FontSize, FontSource, MemoryBackend,
    Script, Slant, StyleKey, StyleStrategy, WritingSystem, WritingSystems,
};
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let latin = WritingSystems::empty().with(WritingSystem::Latin);
    let bold_italic = StyleKey::new(Slant::Italic, weight::BOLD, 0);

    let backend = MemoryBackend::new();
    backend.add_font(
        FontDescription::bitmap("Helvetica", bold_italic, 12)
            .with_writing_systems(latin)
            .with_source(FontSource::Handle(1)),
    );
    backend.add_font(
        FontDescription::scalable("Helvetica", bold_italic)
            .with_writing_systems(latin)
            .with_source(FontSource::Handle(2)),
    );
    backend.add_font(
        FontDescription::scalable("Arial", StyleKey::default())
            .with_foundry("Monotype")
            .with_writing_systems(latin),
    );

    let resolver = FontResolver::new(Box::new(backend));

    let requests = [
        ("Helvetica, Arial", bold_italic, 12),
        ("Helvetica, Arial", bold_italic, 18),
        ("'Times New Roman', Arial [Monotype]", StyleKey::default(), 16),
        ("Nonexistent", StyleKey::default(), 10),
    ];

    for (families, style, px) in requests {
        let request = FontRequest {
            families: FontRequest::parse_families(families),
            style,
            size: FontSize::Pixel(px),
            script: Script::Latin,
            style_strategy: StyleStrategy::PREFER_DEFAULT,
            ..Default::default()
        };

        let mut trace = Vec::new();
        match resolver.resolve_with_trace(&request, &mut trace) {
            Some(font) => println!(
                "{:<40} -> {} '{}' {}px (score {:#x}, exact: {})",
                families,
                font.display_name(),
                font.style_name,
                font.pixel_size,
                font.score,
                font.exact_match(&request)
            ),
            None => println!("{:<40} -> no match", families),
        }
        for msg in &trace {
            println!("    {}", msg);
        }

        let engine = resolver.load(&request);
        println!("    engine: {:?}, refs {}", engine.engine().kind(), engine.ref_count());
    }

    resolver.with_cache(|cache| {
        println!(
            "\ncache: {} engines, {} key entries, {} kb of {} kb",
            cache.engine_count(),
            cache.key_entry_count(),
            cache.total_cost_kb(),
            cache.max_cost_kb()
        );
    });

    // pretend a few minutes have passed
    let report = resolver.poll_sweep(Instant::now() + Duration::from_secs(600));
    println!("sweep: {:?}", report);
}
