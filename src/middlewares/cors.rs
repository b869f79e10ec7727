use actix_cors::Cors;

pub fn create_cors() -> Cors {
    Cors::default()
        // 管理后台前端部署位置不固定，放开来源，只允许只读接口和登录用到的方法
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_any_header()
        .max_age(3600)
}
