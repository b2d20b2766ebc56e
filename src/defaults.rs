/// Fallback travel radius for cleaners who never set one (miles)
pub const DEFAULT_SERVICE_AREA_RADIUS_MILES: f64 = 30.0;

/// Fallback last-minute notification radius when pricing config is absent (miles)
pub const DEFAULT_NOTIFICATION_RADIUS_MILES: f64 = 25.0;
