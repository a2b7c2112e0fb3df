//! utils/rut.rs
//! Dígito verificador de RUT chileno (módulo 11).

/// Calcula el dígito verificador de un RUT sin DV.
///
/// Recorre los dígitos de derecha a izquierda con multiplicadores 2..7
/// (cíclicos). Resultado 11 -> '0', 10 -> 'K', si no el dígito.
/// Devuelve `None` si la entrada no contiene dígitos.
pub fn check_digit(rut: &str) -> Option<char> {
    let digits: Vec<u32> = rut.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.is_empty() {
        return None;
    }

    let mut sum = 0u32;
    let mut multiplier = 2u32;
    for digit in digits.iter().rev() {
        sum += digit * multiplier;
        multiplier = if multiplier == 7 { 2 } else { multiplier + 1 };
    }

    match 11 - (sum % 11) {
        11 => Some('0'),
        10 => Some('K'),
        dv => char::from_digit(dv, 10),
    }
}

/// RUT completo `codigo-DV`. Si no hay dígitos se devuelve el código tal cual.
pub fn full_rut(emp_code: &str) -> String {
    match check_digit(emp_code) {
        Some(dv) => format!("{}-{}", emp_code, dv),
        None => emp_code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(check_digit("12345678"), Some('5'));
        assert_eq!(check_digit("1"), Some('9'));
    }

    #[test]
    fn test_result_ten_is_k() {
        // 6*2 = 12, 12 % 11 = 1, 11 - 1 = 10
        assert_eq!(check_digit("6"), Some('K'));
    }

    #[test]
    fn test_result_eleven_is_zero() {
        // 1*2 + 3*3 = 11
        assert_eq!(check_digit("31"), Some('0'));
    }

    #[test]
    fn test_ignores_separators() {
        assert_eq!(check_digit("12.345.678"), Some('5'));
        assert_eq!(check_digit(""), None);
        assert_eq!(check_digit("abc"), None);
    }

    #[test]
    fn test_full_rut() {
        assert_eq!(full_rut("12345678"), "12345678-5");
        assert_eq!(full_rut("N/A"), "N/A");
    }
}
