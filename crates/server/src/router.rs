use super::{handlers, state::AppState, ws};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register_handler))
        .route("/login", post(handlers::login_handler))
        .route("/refresh", post(handlers::refresh_handler))
        .route("/me", get(handlers::get_me_handler))
        .route("/logout", post(handlers::logout_handler))
        .route("/session", post(handlers::create_session_handler))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users_handler))
        .route("/profile/me", put(handlers::update_profile_handler))
        .route(
            "/collaborator-request",
            post(handlers::collaborator_request_handler),
        )
        .route(
            "/{id}",
            put(handlers::admin_update_user_handler).delete(handlers::delete_user_handler),
        )
}

fn submission_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_submissions_handler).post(handlers::create_submission_handler),
        )
        .route(
            "/{id}",
            put(handlers::update_submission_handler).delete(handlers::delete_submission_handler),
        )
        .route("/{id}/classify", post(handlers::classify_submission_handler))
}

fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/criteria", get(handlers::review_criteria_handler))
        .route("/pending", get(handlers::pending_queue_handler))
        .route(
            "/statistics/overview",
            get(handlers::review_statistics_handler),
        )
        .route("/{id}", get(handlers::review_detail_handler))
        .route("/{id}/approve", post(handlers::approve_submission_handler))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/submissions", get(handlers::admin_list_submissions_handler))
        .route(
            "/submissions/{id}/action",
            post(handlers::submission_action_handler),
        )
        .route(
            "/classification-results",
            get(handlers::list_classification_results_handler)
                .post(handlers::create_classification_result_handler),
        )
        .route(
            "/classification-results/{id}",
            put(handlers::update_classification_result_handler)
                .delete(handlers::delete_classification_result_handler),
        )
        .route(
            "/vouchers",
            get(handlers::admin_list_vouchers_handler).post(handlers::create_voucher_handler),
        )
        .route(
            "/vouchers/{id}",
            put(handlers::update_voucher_handler).delete(handlers::delete_voucher_handler),
        )
        .route(
            "/notifications/system",
            post(handlers::system_notification_handler),
        )
        .route(
            "/notifications/user",
            post(handlers::user_notification_handler),
        )
        .route(
            "/collaborator-requests",
            get(handlers::list_collaborator_requests_handler),
        )
        .route(
            "/collaborator-requests/{user_id}/{action}",
            post(handlers::decide_collaborator_request_handler),
        )
        .route("/statistics", get(handlers::admin_statistics_handler))
        .route("/points", get(handlers::admin_points_handler))
}

fn voucher_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_active_vouchers_handler))
        .route("/stats", get(handlers::voucher_stats_handler))
        .route("/{id}/redeem", post(handlers::redeem_voucher_handler))
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_notifications_handler).post(handlers::create_notification_handler),
        )
        .route("/read-all", put(handlers::mark_all_read_handler))
        .route("/clear", delete(handlers::clear_notifications_handler))
        .route("/{id}", delete(handlers::delete_notification_handler))
        .route("/{id}/read", post(handlers::mark_notification_read_handler))
}

fn reference_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/pharmacies",
            get(handlers::list_pharmacies_handler).post(handlers::create_pharmacy_handler),
        )
        .route(
            "/pharmacies/{id}",
            get(handlers::get_pharmacy_handler)
                .put(handlers::update_pharmacy_handler)
                .delete(handlers::delete_pharmacy_handler),
        )
        .route(
            "/medicine-types",
            get(handlers::list_medicine_types_handler).post(handlers::create_medicine_type_handler),
        )
        .route(
            "/medicine-types/{id}",
            get(handlers::get_medicine_type_handler)
                .put(handlers::update_medicine_type_handler)
                .delete(handlers::delete_medicine_type_handler),
        )
        .route(
            "/criteria",
            get(handlers::list_criteria_handler).post(handlers::create_criterion_handler),
        )
        .route(
            "/criteria/{id}",
            get(handlers::get_criterion_handler)
                .put(handlers::update_criterion_handler)
                .delete(handlers::delete_criterion_handler),
        )
}

fn chat_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/messages",
            get(handlers::list_messages_handler).post(handlers::send_message_handler),
        )
        .route("/messages/{id}/read", post(handlers::mark_message_read_handler))
        .route("/conversations", get(handlers::list_conversations_handler))
        .route(
            "/chatbot",
            get(handlers::chatbot_history_handler).post(handlers::chatbot_message_handler),
        )
}

/// Creates the Axum router with all the application routes.
pub fn create_router(app_state: AppState) -> Router {
    let api = Router::new()
        .route("/ping", get(handlers::ping_handler))
        .route("/metrics", get(handlers::dashboard_metrics_handler))
        .route("/ws/chat", get(ws::chat_socket_handler))
        .nest("/auth", auth_routes())
        .nest("/users", user_routes())
        .nest("/submissions", submission_routes())
        .nest("/submission-approval", review_routes())
        .nest("/admin", admin_routes())
        .nest("/vouchers", voucher_routes())
        .nest("/notifications", notification_routes())
        .nest("/chat", chat_routes())
        .merge(reference_routes());

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}
