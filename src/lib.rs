/*
 *  lib.rs
 *
 *  PixooArt - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

//! Now playing album art, lyrics and ambient light for the Divoom Pixoo64,
//! driven by a Home Assistant media player.

pub mod artwork;
pub mod cache;
pub mod canvas;
pub mod colortools;
pub mod config;
pub mod constants;
pub mod deutils;
pub mod hass;
pub mod imaging;
pub mod lights;
pub mod lyrics;
pub mod media;
pub mod modes;
pub mod orchestrator;
pub mod pixoo;
pub mod providers;
pub mod service;
pub mod textlayout;
