//! Resource route groups, one per handler module.

use crate::constants::API_PREFIX;
use crate::handlers;
use crate::state::AppState;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;

fn path(suffix: &str) -> String {
    format!("{}{}", API_PREFIX, suffix)
}

/// Sign-up, sign-in and verification. Everything except logout is public.
pub fn public_auth_routes() -> Router<Arc<AppState>> {
    use handlers::auth;
    Router::new()
        .route(&path("/auth/register"), post(auth::register))
        .route(&path("/auth/login"), post(auth::login))
        .route(&path("/auth/forgot-password"), post(auth::forgot_password))
        .route(
            &path("/auth/verify-forgot-password-token"),
            post(auth::verify_forgot_password_token),
        )
        .route(&path("/auth/reset-password"), post(auth::reset_password))
        .route(&path("/auth/send-otp-email"), post(auth::send_otp_email))
        .route(&path("/auth/verify-email"), post(auth::verify_email))
        .route(&path("/auth/send-otp-phone"), post(auth::send_otp_phone))
        .route(&path("/auth/verify-phone"), post(auth::verify_phone))
        .route(&path("/auth/oauth/google"), post(auth::oauth_google))
        .route(&path("/auth/oauth/apple"), post(auth::oauth_apple))
}

/// The gateway callback authenticates with its signature header.
pub fn webhook_routes() -> Router<Arc<AppState>> {
    Router::new().route(&path("/payment/webhook"), post(handlers::payment::webhook))
}

pub fn session_routes() -> Router<Arc<AppState>> {
    Router::new().route(&path("/auth/logout"), post(handlers::auth::logout))
}

pub fn media_routes() -> Router<Arc<AppState>> {
    use handlers::media;
    Router::new()
        .route(&path("/media/initiate-upload"), post(media::initiate_upload))
        .route(&path("/media/presigned-urls"), post(media::presigned_urls))
        .route(&path("/media/complete-upload"), post(media::complete_upload))
        .route(&path("/media/abort-upload"), post(media::abort_upload))
        .route(&path("/media/media-access-url"), post(media::media_access_url))
        .route(&path("/media/thumbnail/initiate"), post(media::initiate_thumbnail))
        .route(&path("/media/all"), get(media::list_media))
        .route(
            &path("/media/{id}"),
            get(media::get_media)
                .put(media::update_media)
                .delete(media::delete_media),
        )
        .route(&path("/media/{id}/thumbnail"), put(media::confirm_thumbnail))
}

pub fn library_routes() -> Router<Arc<AppState>> {
    use handlers::library;
    Router::new()
        .route(
            &path("/media-library/playlists"),
            post(library::create_playlist).get(library::list_playlists),
        )
        .route(
            &path("/media-library/playlists/{id}"),
            get(library::get_playlist)
                .put(library::update_playlist)
                .delete(library::delete_playlist),
        )
        .route(
            &path("/media-library/playlists/{id}/add-media"),
            post(library::add_playlist_media),
        )
        .route(
            &path("/media-library/playlists/{id}/remove-media"),
            post(library::remove_playlist_media),
        )
        .route(
            &path("/media-library/watching-history"),
            post(library::record_watch).get(library::list_history),
        )
        .route(
            &path("/media-library/favourites"),
            post(library::add_favourite).get(library::list_favourites),
        )
        .route(
            &path("/media-library/favourites/{media_id}"),
            delete(library::remove_favourite),
        )
        .route(
            &path("/media-library/watch-later"),
            post(library::add_watch_later).get(library::list_watch_later),
        )
        .route(
            &path("/media-library/watch-later/{media_id}"),
            delete(library::remove_watch_later),
        )
        .route(
            &path("/media-library/downloads"),
            post(library::request_download).get(library::list_downloads),
        )
        .route(
            &path("/media-library/downloads/{id}"),
            delete(library::delete_download),
        )
}

pub fn artist_routes() -> Router<Arc<AppState>> {
    use handlers::artist;
    Router::new()
        .route(
            &path("/artist"),
            get(artist::list_artists).post(artist::create_artist),
        )
        .route(
            &path("/artist/{id}"),
            get(artist::get_artist)
                .put(artist::update_artist)
                .delete(artist::delete_artist),
        )
        .route(&path("/artist/{id}/follow"), post(artist::follow_artist))
        .route(&path("/artist/{id}/unfollow"), post(artist::unfollow_artist))
}

pub fn store_routes() -> Router<Arc<AppState>> {
    use handlers::store;
    Router::new()
        .route(&path("/store/create-product"), post(store::create_product))
        .route(&path("/store/update-product/{id}"), put(store::update_product))
        .route(&path("/store/delete-product/{id}"), delete(store::delete_product))
        .route(&path("/store/products"), get(store::list_products))
        .route(&path("/store/product/{id}"), get(store::get_product))
        .route(&path("/store/cart"), get(store::get_cart))
        .route(&path("/store/add-to-cart"), post(store::add_to_cart))
        .route(
            &path("/store/remove-from-cart/{product_id}"),
            delete(store::remove_from_cart),
        )
        .route(&path("/store/checkout"), post(store::checkout))
        .route(&path("/store/order-history"), get(store::order_history))
        .route(&path("/store/order/{order_id}"), get(store::get_order))
}

pub fn address_routes() -> Router<Arc<AppState>> {
    use handlers::address;
    Router::new()
        .route(
            &path("/address"),
            post(address::add_address).get(address::list_addresses),
        )
        .route(
            &path("/address/default-address"),
            get(address::get_default_address),
        )
        .route(
            &path("/address/default-address/{id}"),
            put(address::set_default_address),
        )
        .route(
            &path("/address/{id}"),
            get(address::get_address)
                .put(address::update_address)
                .delete(address::delete_address),
        )
}

pub fn subscription_routes() -> Router<Arc<AppState>> {
    use handlers::subscription;
    Router::new()
        .route(&path("/subscription"), get(subscription::list_plans))
        .route(&path("/subscription/me"), get(subscription::my_subscription))
        .route(
            &path("/subscription/user/{user_id}"),
            get(subscription::user_subscription),
        )
        .route(&path("/subscription/{id}"), get(subscription::get_plan))
}

pub fn payment_routes() -> Router<Arc<AppState>> {
    use handlers::payment;
    Router::new()
        .route(&path("/payment/subscription"), post(payment::subscription_payment))
        .route(&path("/payment/merchandise"), post(payment::merchandise_payment))
        .route(
            &path("/payment/transaction/{payment_id}"),
            get(payment::get_transaction),
        )
        .route(&path("/payment/refund/{payment_id}"), post(payment::refund))
}
