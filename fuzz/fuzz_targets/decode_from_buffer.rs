#![no_main]

use arbitrary::Arbitrary;
use lazy_thumbnail::engine::{Source, ThumbnailConfig, Thumbnailer};
use lazy_thumbnail::ops::{FitMode, RequestContext, ThumbnailQuery};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    width: u16,
    height: u16,
    fit: u8,
    strict: bool,
    fast_shrink_on_load: bool,
    data: &'a [u8],
}

fuzz_target!(|input: Input<'_>| {
    if input.data.is_empty() {
        return;
    }

    let fit = match input.fit % 5 {
        0 => FitMode::Crop,
        1 => FitMode::Min,
        2 => FitMode::Embed,
        3 => FitMode::Max,
        _ => FitMode::IgnoreAspect,
    };
    // Keep outputs small; the pixel budget is exercised by unit tests
    let query = ThumbnailQuery::new(input.width as u32 % 512, input.height as u32 % 512)
        .with_fit(fit)
        .with_fast_shrink_on_load(input.fast_shrink_on_load);

    let config = ThumbnailConfig::default()
        .with_fail_on_error(input.strict)
        .with_limit_output_pixels(4_000_000);
    let mut ctx = RequestContext::new(query);
    let _ = Thumbnailer::new(config).thumbnail(&mut ctx, &Source::from_bytes(input.data.to_vec()));
});
