//! Нормализация значений GEOMETRY.
//!
//! Колонка принимает готовые байты (WKB или сериализованный SQL geometry,
//! например результат `STAsBinary()`) либо их hex-представление. Текстовые
//! форматы вроде WKT и GeoJSON не конвертируются.

/// Разбирает hex-строку: необязательный префикс `0x`/`0X`, пробельные
/// символы в любом месте, чётное число hex-цифр.
pub fn parse_hex(text: &str) -> Option<Vec<u8>> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let digits: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(digits).ok()
}
