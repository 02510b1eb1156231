pub mod state_dao;
