/// Labeling, class balancing and ensemble learning
pub mod balancer;
pub mod feature;
pub mod forest;
pub mod knn;
pub mod tree;

// Re-export commonly used types
pub use balancer::{class_counts, BalancedSet, ClassBalancer, NeighborWarning};
pub use feature::{
    derive_category, realization_ratio, Category, FeatureVector, InferenceRequest, FEATURE_NAMES,
    N_FEATURES,
};
pub use forest::ForestModel;
