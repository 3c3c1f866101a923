pub mod cache_warmer;
