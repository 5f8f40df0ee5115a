//! AutoCAD 颜色索引（ACI）到 RGB 的近似换算。

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    /// `#rrggbb` 形式。
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    /// PDF 颜色分量（0..=1）。
    pub fn unit(self) -> (f64, f64, f64) {
        (
            f64::from(self.0) / 255.0,
            f64::from(self.1) / 255.0,
            f64::from(self.2) / 255.0,
        )
    }
}

/// 250..=255 的灰阶。
const GRAYS: [u8; 6] = [51, 91, 132, 173, 214, 255];

/// 10..=249 每组 10 个索引共享一个色相，组内依次降低明度，奇数索引为浅色版本。
const VALUES: [f64; 5] = [1.0, 0.65, 0.5, 0.3, 0.15];

pub fn aci_to_rgb(index: i16) -> Rgb {
    match index {
        1 => Rgb(255, 0, 0),
        2 => Rgb(255, 255, 0),
        3 => Rgb(0, 255, 0),
        4 => Rgb(0, 255, 255),
        5 => Rgb(0, 0, 255),
        6 => Rgb(255, 0, 255),
        7 => Rgb::WHITE,
        8 => Rgb(128, 128, 128),
        9 => Rgb(192, 192, 192),
        10..=249 => {
            let offset = (index - 10) as usize;
            let hue = (offset / 10) as f64 * 15.0;
            let shade = offset % 10;
            let value = VALUES[shade / 2];
            let saturation = if shade % 2 == 0 { 1.0 } else { 0.5 };
            hsv_to_rgb(hue, saturation, value)
        }
        250..=255 => {
            let gray = GRAYS[(index - 250) as usize];
            Rgb(gray, gray, gray)
        }
        // 0（随块）与 256（随层）等特殊值按白/黑处理
        _ => Rgb::WHITE,
    }
}

fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> Rgb {
    let chroma = value * saturation;
    let sector = (hue / 60.0) % 6.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u8 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    let channel = |c: f64| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb(channel(r), channel(g), channel(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_colors() {
        assert_eq!(aci_to_rgb(1), Rgb(255, 0, 0));
        assert_eq!(aci_to_rgb(3).hex(), "#00ff00");
        assert_eq!(aci_to_rgb(7), Rgb::WHITE);
        assert_eq!(aci_to_rgb(250), Rgb(51, 51, 51));
    }

    #[test]
    fn hue_groups() {
        // 10 为纯红，11 为浅红
        assert_eq!(aci_to_rgb(10), Rgb(255, 0, 0));
        assert_eq!(aci_to_rgb(11), Rgb(255, 128, 128));
        // 50 所在组色相为 60 度（黄）
        assert_eq!(aci_to_rgb(50), Rgb(255, 255, 0));
        // 明度逐级降低
        let sum = |rgb: Rgb| u16::from(rgb.0) + u16::from(rgb.1) + u16::from(rgb.2);
        assert!(sum(aci_to_rgb(130)) > sum(aci_to_rgb(138)));
    }

    #[test]
    fn unit_components() {
        let (r, g, b) = Rgb(255, 0, 51).unit();
        assert!((r - 1.0).abs() < 1e-9);
        assert!(g.abs() < 1e-9);
        assert!((b - 0.2).abs() < 1e-9);
    }
}
