pub mod course_api;
