use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use carpool_backend::{
    AppState,
    config::Config,
    identity::IdentityProvider,
    middleware::{auth_middleware, log_errors},
    routes,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // 设置 Redis 客户端（聊天群组文档存储）
    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");

    // 设置身份提供方客户端
    let identity = Arc::new(IdentityProvider::new(&config));

    // 设置应用状态
    let state = AppState {
        pool,
        config: config.clone(),
        redis: Arc::new(redis_client),
        identity,
    };

    // 将路由分为公开路由和受保护路由
    let public_routes = Router::new()
        .route("/ping", get(routes::ping::ping))
        .route("/check-username", post(routes::user::check_username))
        .route("/whitelist/check-email", post(routes::whitelist::check_email));

    let protected_routes = Router::new()
        // 行程路由
        .route(
            "/trips",
            get(routes::trip::list_upcoming_trips).post(routes::trip::create_trip),
        )
        .route("/trips/all", get(routes::trip::list_all_trips))
        .route(
            "/trips/{id}",
            get(routes::trip::get_trip)
                .put(routes::trip::update_trip)
                .delete(routes::trip::delete_trip),
        )
        .route("/user/{user_uid}/trips", get(routes::trip::list_user_trips))
        .route(
            "/user/{user_uid}/trips/all",
            get(routes::trip::list_all_user_trips),
        )
        // 乘客请求路由
        .route(
            "/trip/{trip_id}/markers",
            get(routes::passenger::list_trip_markers),
        )
        .route(
            "/trip/{trip_id}/marker",
            post(routes::passenger::create_marker),
        )
        .route(
            "/markers/{id}",
            get(routes::passenger::get_marker)
                .put(routes::passenger::update_marker)
                .delete(routes::passenger::delete_marker),
        )
        .route(
            "/markers/{id}/trip-owner-update",
            put(routes::passenger::owner_update_marker),
        )
        // 车辆路由
        .route("/vehicles", get(routes::vehicle::list_vehicles))
        .route(
            "/vehicles/{id}",
            get(routes::vehicle::get_vehicle).put(routes::vehicle::update_vehicle),
        )
        // 用户与角色路由
        .route("/users", get(routes::user::list_users))
        .route("/update-user-role", post(routes::user::update_user_role))
        .route("/sync-database", post(routes::user::sync_database))
        // 白名单路由
        .route(
            "/whitelist",
            get(routes::whitelist::get_whitelist)
                .post(routes::whitelist::add_email)
                .delete(routes::whitelist::remove_email),
        )
        // 聊天群组路由
        .route("/chat/groups", get(routes::chat::list_groups))
        .route(
            "/chat/groups/{group_id}/members",
            post(routes::chat::add_members),
        )
        .route("/trip/{trip_id}/chat-group", get(routes::chat::get_trip_group))
        // 应用认证中间件
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // 创建基础路由
    let router = Router::new().nest(
        &config.api_base_uri.clone(),
        Router::new().merge(public_routes).merge(protected_routes),
    );

    // 添加日志中间件
    let router = router.layer(axum::middleware::from_fn(log_errors));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        use tower_http::cors::CorsLayer;
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    // 添加应用状态
    let app = router.with_state(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Failed to start server");
}
