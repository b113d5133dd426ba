use std::net::{IpAddr, SocketAddr};

use inference_gateway::{AppState, config::Config, logging, metrics, router::create_router};

#[tokio::main]
async fn main() {
    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 初始化日志
    logging::init(config.log_format);

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    let metrics_handle = metrics::install_recorder().expect("Failed to install metrics recorder");

    // 设置应用状态
    let state =
        AppState::from_config(config, metrics_handle).expect("Failed to build application state");
    let background = state.start_background();

    tracing::info!(
        backend = %state.config.backend_url,
        model = %state.config.model_id,
        cache_enabled = state.cache.is_enabled(),
        single_flight = state.config.cache_single_flight,
        "Gateway configured"
    );

    let router = create_router(state.clone());

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

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
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    // 释放后台任务与共享连接
    for task in background {
        task.abort();
    }
    drop(state);
    tracing::info!("Gateway shut down");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
