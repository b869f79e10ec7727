use rand::Rng;

/// 生成 6 位数字验证码，范围 000000-999999，不足 6 位左侧补零
pub fn generate_six_digit_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..=999_999u32))
}
