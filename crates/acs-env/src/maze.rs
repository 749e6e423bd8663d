use acs_core::{Action, DeterministicRng, Environment, Perception, ResetKind, SplitMix64, Transition};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 8x8 maze with a single goal in the top right corner.
pub const MAZE4: &str = "\
11111111
10010091
11000101
11010001
10011011
10100001
10001101
11111111";

/// A loop around a wall block, goal on the bottom row.
pub const MAZE_SMALL: &str = "\
1111111
1000001
1011101
1000F01
1111111";

/// Look up one of the built-in layouts by name.
pub fn builtin(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "maze4" => Some(MAZE4),
        "maze_small" | "small" => Some(MAZE_SMALL),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MazeError {
    #[error("maze has no rows")]
    Empty,
    #[error("row {row} has {actual} cells, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("unknown cell {symbol:?} at row {row}, column {column}")]
    UnknownCell { row: usize, column: usize, symbol: char },
    #[error("maze has no goal cell")]
    NoGoal,
    #[error("maze has no free cell to start from")]
    NoFreeCell,
    #[error("slip probability {0} is outside [0, 1]")]
    Slip(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Cell {
    Free,
    Wall,
    Goal,
}

impl Cell {
    fn parse(symbol: char) -> Option<Self> {
        match symbol {
            '0' => Some(Self::Free),
            '1' => Some(Self::Wall),
            'F' | '9' => Some(Self::Goal),
            _ => None,
        }
    }

    /// The symbol an agent perceives for this cell.
    pub fn symbol(self) -> char {
        match self {
            Self::Free => '0',
            Self::Wall => '1',
            Self::Goal => '9',
        }
    }
}

/// The eight moves, indexed clockwise from north. Action `i` is `Direction::ALL[i]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    pub fn from_action(action: Action) -> Option<Self> {
        Self::ALL.get(action.0).copied()
    }

    pub fn action(self) -> Action {
        Action(self as usize)
    }

    pub fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::NorthEast => (1, -1),
            Self::East => (1, 0),
            Self::SouthEast => (1, 1),
            Self::South => (0, 1),
            Self::SouthWest => (-1, 1),
            Self::West => (-1, 0),
            Self::NorthWest => (-1, -1),
        }
    }
}

/// Grid world: the agent perceives its eight neighbours and moves in eight directions.
///
/// Walls block movement. Stepping onto the goal pays [`Maze::GOAL_REWARD`] and ends the
/// trial. With a non-zero slip probability the executed move is sometimes replaced by a
/// random one, which makes the environment non-deterministic.
#[derive(Debug, Clone)]
pub struct Maze {
    id: String,
    width: i32,
    height: i32,
    cells: Vec<Cell>,
    starts: Vec<usize>,
    position: usize,
    done: bool,
    slip: f64,
    rng: SplitMix64,
    tests: Vec<Transition>,
}

impl Maze {
    pub const GOAL_REWARD: f64 = 1000.0;

    /// Parse a layout of `'0'` free, `'1'` wall and `'F'`/`'9'` goal cells.
    ///
    /// Blank lines and whitespace inside a row are ignored.
    pub fn parse(id: impl Into<String>, text: &str) -> Result<Self, MazeError> {
        let mut width = None;
        let mut cells = Vec::new();
        let mut height = 0;

        let rows = text.lines().map(str::trim).filter(|line| !line.is_empty());
        for (row, line) in rows.enumerate() {
            let mut actual = 0;
            for (column, symbol) in line.chars().filter(|c| !c.is_whitespace()).enumerate() {
                let cell = Cell::parse(symbol).ok_or(MazeError::UnknownCell { row, column, symbol })?;
                cells.push(cell);
                actual += 1;
            }
            let expected = *width.get_or_insert(actual);
            if actual != expected {
                return Err(MazeError::Ragged { row, expected, actual });
            }
            height += 1;
        }

        let width = width.ok_or(MazeError::Empty)?;
        if width == 0 {
            return Err(MazeError::Empty);
        }
        if !cells.contains(&Cell::Goal) {
            return Err(MazeError::NoGoal);
        }
        let starts: Vec<usize> = cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell == Cell::Free)
            .map(|(idx, _)| idx)
            .collect();
        let Some(&position) = starts.first() else {
            return Err(MazeError::NoFreeCell);
        };

        Ok(Self {
            id: id.into(),
            width: width as i32,
            height,
            cells,
            starts,
            position,
            done: false,
            slip: 0.0,
            rng: SplitMix64::new(0),
            tests: Vec::new(),
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SplitMix64::new(seed);
        self
    }

    pub fn with_slip(mut self, slip: f64) -> Result<Self, MazeError> {
        if !(0.0..=1.0).contains(&slip) {
            return Err(MazeError::Slip(slip));
        }
        self.slip = slip;
        Ok(self)
    }

    pub fn width(&self) -> usize {
        self.width as usize
    }

    pub fn height(&self) -> usize {
        self.height as usize
    }

    pub fn slip(&self) -> f64 {
        self.slip
    }

    /// Cells a trial may start from.
    pub fn free_cells(&self) -> usize {
        self.starts.len()
    }

    /// Current `(x, y)` of the agent.
    pub fn position(&self) -> (usize, usize) {
        let (x, y) = self.coords(self.position);
        (x as usize, y as usize)
    }

    /// Place the agent on a non-wall cell. Returns `false` for walls and out-of-bounds cells.
    pub fn set_position(&mut self, x: usize, y: usize) -> bool {
        match self.idx(x as i32, y as i32) {
            Some(idx) if self.cells[idx] != Cell::Wall => {
                self.position = idx;
                self.done = self.cells[idx] == Cell::Goal;
                true
            }
            _ => false,
        }
    }

    /// Cell at `(x, y)`; anything outside the grid reads as a wall.
    pub fn cell(&self, x: i32, y: i32) -> Cell {
        self.idx(x, y).map(|idx| self.cells[idx]).unwrap_or(Cell::Wall)
    }

    fn idx(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some((y * self.width + x) as usize)
    }

    fn coords(&self, idx: usize) -> (i32, i32) {
        let idx = idx as i32;
        (idx % self.width, idx / self.width)
    }

    fn perceive(&self, idx: usize) -> Perception {
        let (x, y) = self.coords(idx);
        Perception::new(
            Direction::ALL
                .iter()
                .map(|dir| {
                    let (dx, dy) = dir.offset();
                    self.cell(x + dx, y + dy).symbol()
                })
                .collect(),
        )
    }

    /// Where `direction` leads from `idx`. Walls leave the agent in place.
    fn target(&self, idx: usize, direction: Direction) -> usize {
        let (x, y) = self.coords(idx);
        let (dx, dy) = direction.offset();
        match self.idx(x + dx, y + dy) {
            Some(next) if self.cells[next] != Cell::Wall => next,
            _ => idx,
        }
    }
}

impl Environment for Maze {
    fn id(&self) -> &str {
        &self.id
    }

    fn perception_length(&self) -> usize {
        Direction::ALL.len()
    }

    fn action_count(&self) -> usize {
        Direction::ALL.len()
    }

    fn reset(&mut self) -> ResetKind {
        let pick = self.rng.next_index(self.starts.len());
        self.position = self.starts[pick];
        self.done = false;
        ResetKind::Explore
    }

    fn situation(&self, out: &mut Perception) {
        out.copy_from(&self.perceive(self.position));
    }

    fn execute(&mut self, action: Action) -> f64 {
        let Some(mut direction) = Direction::from_action(action) else {
            return 0.0;
        };
        if self.slip > 0.0 && self.rng.chance(self.slip) {
            direction = Direction::ALL[self.rng.next_index(Direction::ALL.len())];
            tracing::trace!(maze = %self.id, action = %action, slipped = ?direction, "Move slipped");
        }

        self.position = self.target(self.position, direction);
        if self.cells[self.position] == Cell::Goal {
            self.done = true;
            Self::GOAL_REWARD
        } else {
            0.0
        }
    }

    fn is_reset(&self) -> bool {
        self.done
    }

    fn do_testing(&mut self) {
        self.tests.clear();
        for &start in self.starts.iter().rev() {
            for direction in Direction::ALL.iter().rev() {
                self.tests.push(Transition {
                    before: self.perceive(start),
                    action: direction.action(),
                    after: self.perceive(self.target(start, *direction)),
                });
            }
        }
    }

    fn next_test(&mut self) -> Option<Transition> {
        self.tests.pop()
    }

    fn end_testing(&mut self) {
        self.tests.clear();
    }
}
