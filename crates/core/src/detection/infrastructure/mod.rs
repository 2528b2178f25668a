pub mod iou_region_tracker;
pub mod replay_face_detector;
