//! Photo effects applied at decode time. Effects are plain pixel transforms
//! tagged by [`EffectKind`]; the provider randomly picks one of the
//! configured kinds (or none) for each freshly decoded picture.

use image::RgbaImage;
use rand::rngs::StdRng;
use rand::Rng;
use tileconfig::EffectType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    Grayscale,
    Sepia,
    Posterize,
    Invert,
}

impl From<EffectType> for EffectKind {
    fn from(value: EffectType) -> Self {
        match value {
            EffectType::Grayscale => EffectKind::Grayscale,
            EffectType::Sepia => EffectKind::Sepia,
            EffectType::Posterize => EffectKind::Posterize,
            EffectType::Invert => EffectKind::Invert,
        }
    }
}

impl EffectKind {
    pub fn apply(self, image: &mut RgbaImage) {
        for pixel in image.pixels_mut() {
            let [r, g, b, a] = pixel.0;
            pixel.0 = match self {
                EffectKind::Grayscale => {
                    let y = luminance(r, g, b);
                    [y, y, y, a]
                }
                EffectKind::Sepia => {
                    let y = luminance(r, g, b) as f32;
                    [
                        (y * 1.07).min(255.0) as u8,
                        (y * 0.74) as u8,
                        (y * 0.43) as u8,
                        a,
                    ]
                }
                EffectKind::Posterize => [r & 0xc0, g & 0xc0, b & 0xc0, a],
                EffectKind::Invert => [255 - r, 255 - g, 255 - b, a],
            };
        }
    }
}

fn luminance(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) as u8
}

/// Picks an effect for each decoded picture. Every configured kind and the
/// no-effect case are drawn with equal probability.
#[derive(Debug, Clone)]
pub struct EffectProvider {
    enabled: Vec<EffectKind>,
}

impl EffectProvider {
    pub fn new(enabled: &[EffectType]) -> Self {
        Self {
            enabled: enabled.iter().copied().map(EffectKind::from).collect(),
        }
    }

    pub fn next(&self, rng: &mut StdRng) -> Option<EffectKind> {
        if self.enabled.is_empty() {
            return None;
        }
        let pick = rng.gen_range(0..=self.enabled.len());
        self.enabled.get(pick).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn empty_provider_yields_no_effect() {
        let provider = EffectProvider::new(&[]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..16 {
            assert_eq!(provider.next(&mut rng), None);
        }
    }

    #[test]
    fn provider_draws_from_enabled_kinds() {
        let provider = EffectProvider::new(&[EffectType::Grayscale, EffectType::Invert]);
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen_none = false;
        let mut seen_some = false;
        for _ in 0..64 {
            match provider.next(&mut rng) {
                None => seen_none = true,
                Some(kind) => {
                    assert!(matches!(kind, EffectKind::Grayscale | EffectKind::Invert));
                    seen_some = true;
                }
            }
        }
        assert!(seen_none && seen_some);
    }

    #[test]
    fn grayscale_flattens_channels() {
        let mut image = RgbaImage::from_pixel(2, 2, image::Rgba([200, 100, 50, 255]));
        EffectKind::Grayscale.apply(&mut image);
        let px = image.get_pixel(0, 0).0;
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn invert_is_an_involution() {
        let mut image = RgbaImage::from_pixel(1, 1, image::Rgba([10, 20, 30, 255]));
        EffectKind::Invert.apply(&mut image);
        EffectKind::Invert.apply(&mut image);
        assert_eq!(image.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }
}
