pub mod ports;
pub mod etl_use_case;
pub mod verify_use_case;
