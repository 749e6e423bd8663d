//! Reference environments for the ACS2 learning core.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod maze;

pub use maze::{builtin, Cell, Direction, Maze, MazeError, MAZE4, MAZE_SMALL};
