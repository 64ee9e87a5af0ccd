pub mod determination;
