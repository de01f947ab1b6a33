/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Output emitters: one module per output kind, each a pure
//! function from an `AssembledProgram` to bytes or text. None of these
//! existed in the teacher, whose assembler produced a single fixed-shape
//! ROM image directly — here the same `AssembledProgram` feeds whichever
//! combination of `-f`/`-l`/`--map` the CLI selects.

pub mod bin;
pub mod ihex;
pub mod listing;
pub mod map;
pub mod text;
