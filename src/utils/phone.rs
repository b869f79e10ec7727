/// 手机号归一化：只保留数字，恰好 10 位时补上国家码
///
/// 已带国家码的号码去掉非数字字符后保持不变。
pub fn normalize_phone(phone: &str, country_code: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() == 10 {
        format!("{country_code}{digits}")
    } else {
        digits
    }
}

/// 两个号码归一化后是否相同；任一方为空则视为不同
pub fn phones_match(a: &str, b: &str, country_code: &str) -> bool {
    let a = normalize_phone(a, country_code);
    let b = normalize_phone(b, country_code);
    !a.is_empty() && a == b
}

/// 日志与响应里只展示末 4 位
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 4 {
        return "*".repeat(digits.len());
    }
    let tail: String = digits[digits.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(digits.len() - 4), tail)
}

pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}
