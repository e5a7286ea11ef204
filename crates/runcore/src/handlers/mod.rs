//! HTTP handlers, grouped by the resource they act on.

pub mod courses;
pub mod health;
pub mod imports;
pub mod pagination;
pub mod sessions;

pub use courses::{
    __path_course_rankings, __path_courses_in_bounds, __path_list_courses, __path_nearby_courses,
    __path_viewport_heatmap, course_rankings, courses_in_bounds, list_courses, nearby_courses,
    viewport_heatmap,
};
pub use health::{__path_health_check, health_check};
pub use imports::{__path_get_import, __path_upload_import, get_import, upload_import};
pub use sessions::{
    __path_batch_upload_chunks, __path_complete_session, __path_create_session,
    __path_recover_session, __path_upload_chunk, batch_upload_chunks, complete_session,
    create_session, recover_session, upload_chunk,
};
