pub mod output_vector_bo;
pub mod target_bo;
