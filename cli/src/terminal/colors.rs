use colored::Color;

pub const PRIMARY: Color = Color::TrueColor { r: 129, g: 199, b: 132 };
pub const ACCENT: Color = Color::TrueColor { r: 255, g: 213, b: 79 };
pub const SEPARATOR: Color = Color::TrueColor { r: 97, g: 97, b: 97 };
pub const TEXT_DEFAULT: Color = Color::TrueColor { r: 224, g: 224, b: 224 };
pub const IPV4_ADDR: Color = Color::TrueColor { r: 100, g: 181, b: 246 };
pub const MAC_ADDR: Color = Color::TrueColor { r: 186, g: 104, b: 200 };
pub const RISK: Color = Color::TrueColor { r: 229, g: 115, b: 115 };
pub const ANOMALY: Color = Color::TrueColor { r: 255, g: 183, b: 77 };
