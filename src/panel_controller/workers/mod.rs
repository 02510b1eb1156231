pub mod write_back_thread;
