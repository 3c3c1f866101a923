pub use self::{
    http::HTTP,
    upstream::{MetricPageQuery, Upstream},
};

mod http;
mod upstream;
