use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use wa_relay::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{
        AnthropicService, CompletionClient, EmailService, TwilioService, WhatsAppService,
        build_http_client,
    },
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    models::DeliveryMethod,
    services::*,
    swagger::swagger_config,
    utils::{JwtService, hash_password},
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // `wa-relay hash-password <password>` 生成管理员密码哈希后退出
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("hash-password") {
        let Some(password) = args.get(2) else {
            eprintln!("usage: wa-relay hash-password <password>");
            std::process::exit(2);
        };
        let hash = hash_password(password).map_err(std::io::Error::other)?;
        println!("{hash}");
        return Ok(());
    }

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let http_client = build_http_client(&config.http).map_err(std::io::Error::other)?;

    // 创建JWT服务
    let jwt_service = JwtService::new(&config.jwt.secret, config.jwt.access_token_expires_in);

    // 创建外部服务
    let whatsapp_service = WhatsAppService::new(http_client.clone(), config.whatsapp.clone());

    let ai: Option<Arc<dyn CompletionClient>> =
        match AnthropicService::from_config(http_client.clone(), &config.anthropic) {
            Some(service) => {
                log::info!("AI replies enabled with model {}", config.anthropic.model);
                Some(Arc::new(service))
            }
            None => {
                log::warn!("ANTHROPIC_API_KEY not set, replies use keyword matching only");
                None
            }
        };

    // 管理员与二次验证
    let directory = AdminDirectory::from_config(&config.auth);

    let mut challenges =
        ChallengeManager::new(Arc::new(InMemoryChallengeStore::new()), directory.clone())
            .with_sender(DeliveryMethod::Whatsapp, Arc::new(whatsapp_service.clone()));
    match &config.twilio {
        Some(twilio) => {
            challenges = challenges.with_sender(
                DeliveryMethod::Sms,
                Arc::new(TwilioService::new(http_client.clone(), twilio.clone())),
            );
        }
        None => log::info!("Twilio not configured, SMS delivery disabled"),
    }
    match &config.smtp {
        Some(smtp) => {
            challenges = challenges
                .with_sender(DeliveryMethod::Email, Arc::new(EmailService::new(smtp.clone())));
        }
        None => log::info!("SMTP not configured, email delivery disabled"),
    }

    // 创建服务
    let auth_service = AuthService::new(directory, challenges, jwt_service.clone());
    let admin_service = AdminService::new(pool.clone(), config.auth.country_code.clone());
    let pipeline = MessagePipeline::new(
        Arc::new(ConversationService::new(pool.clone())),
        ReplyResolver::new(ai),
        Arc::new(whatsapp_service.clone()),
    );

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors())
            .wrap(Logger::default())
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(admin_service.clone()))
            .app_data(web::Data::new(pipeline.clone()))
            .app_data(web::Data::new(whatsapp_service.clone()))
            .configure(swagger_config)
            .configure(handlers::health_config)
            .configure(handlers::webhook_config)
            .configure(handlers::auth_config)
            .configure(handlers::admin_config)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
