#![no_main]

use arbitrary::Arbitrary;
use lazy_thumbnail::engine::{resolve_jpeg_shrink, resolve_shrink, ThumbnailConfig};
use lazy_thumbnail::ops::{FitMode, ThumbnailQuery};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Plan {
    width: u32,
    height: u32,
    target_width: u32,
    target_height: u32,
    fit: u8,
    without_enlargement: bool,
    fast_shrink_on_load: bool,
}

fuzz_target!(|plan: Plan| {
    let width = plan.width.max(1);
    let height = plan.height.max(1);
    let fit = match plan.fit % 5 {
        0 => FitMode::Crop,
        1 => FitMode::Min,
        2 => FitMode::Embed,
        3 => FitMode::Max,
        _ => FitMode::IgnoreAspect,
    };
    let query = ThumbnailQuery::new(plan.target_width, plan.target_height)
        .with_fit(fit)
        .without_enlargement(plan.without_enlargement)
        .with_fast_shrink_on_load(plan.fast_shrink_on_load);

    let ratios = resolve_shrink(width, height, &query);
    assert!(ratios.hshrink > 0.0 && ratios.hshrink <= width as f64);
    assert!(ratios.vshrink > 0.0 && ratios.vshrink <= height as f64);

    let factor = resolve_jpeg_shrink(width, height, &query, &ThumbnailConfig::default());
    assert!(matches!(factor, 1 | 2 | 4 | 8));
});
