pub mod board_service;
pub mod feed_service;
pub mod geo_service;
pub mod location_service;
pub mod publish_service;
pub mod session_service;
pub mod viewer_service;
