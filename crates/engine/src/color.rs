use consentry_core::AuditError;
use std::collections::HashMap;

/// Most frequent color of a PNG, averaged within its 16-level-per-channel bucket.
pub fn dominant_color(png: &[u8]) -> Result<[u8; 3], AuditError> {
    let img = image::load_from_memory(png)
        .map_err(|e| AuditError::parsing_error(format!("Failed to decode capture: {}", e)))?
        .to_rgb8();

    let mut buckets: HashMap<[u8; 3], (u64, [u64; 3])> = HashMap::new();
    for pixel in img.pixels() {
        let [r, g, b] = pixel.0;
        let entry = buckets.entry([r >> 4, g >> 4, b >> 4]).or_insert((0, [0; 3]));
        entry.0 += 1;
        entry.1[0] += r as u64;
        entry.1[1] += g as u64;
        entry.1[2] += b as u64;
    }

    let (_, (count, sum)) = buckets
        .into_iter()
        .max_by(|(ka, (ca, _)), (kb, (cb, _))| ca.cmp(cb).then(kb.cmp(ka)))
        .ok_or_else(|| AuditError::parsing_error("Capture has no pixels"))?;

    Ok([
        (sum[0] / count) as u8,
        (sum[1] / count) as u8,
        (sum[2] / count) as u8,
    ])
}

fn to_linear(channel: u8) -> f64 {
    let c = channel as f64 / 255.0;
    if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) }
}

/// sRGB to CIE L*a*b* under D65.
pub fn to_lab(rgb: [u8; 3]) -> [f64; 3] {
    let [r, g, b] = rgb.map(to_linear);
    let x = (0.4124 * r + 0.3576 * g + 0.1805 * b) / 0.95047;
    let y = 0.2126 * r + 0.7152 * g + 0.0722 * b;
    let z = (0.0193 * r + 0.1192 * g + 0.9505 * b) / 1.08883;

    let f = |t: f64| {
        if t > 0.008856 { t.cbrt() } else { 7.787 * t + 16.0 / 116.0 }
    };
    let (fx, fy, fz) = (f(x), f(y), f(z));
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// CIE76 color difference.
pub fn delta_e(a: [u8; 3], b: [u8; 3]) -> f64 {
    let (la, lb) = (to_lab(a), to_lab(b));
    la.iter().zip(lb.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

#[cfg(test)]
pub(crate) fn solid_png(rgb: [u8; 3], width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
