mod gate;
mod provider;
mod sampler;

pub use gate::{DistanceGate, EARTH_RADIUS_M, haversine_m};
pub use provider::{
    GeolocationError, GeolocationProvider, LocationSample, PositionOptions, RequestId, WatchId,
};
pub use sampler::{RequestPurpose, Sampler, SamplingMode, StoppedTracking, TrackingToken};
